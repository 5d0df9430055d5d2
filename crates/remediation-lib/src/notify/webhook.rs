//! Slack-compatible incoming webhook channel

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{ChannelError, NotifyChannel};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts `{"text": message}` to a webhook URL
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl NotifyChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, text: &str) -> Result<(), ChannelError> {
        if self.url.trim().is_empty() {
            return Err(ChannelError::NotConfigured("webhook url is empty".to_string()));
        }

        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChannelError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}
