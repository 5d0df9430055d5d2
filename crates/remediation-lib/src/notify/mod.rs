//! Outcome notifications
//!
//! Actions report through the [`NotificationSink`] capability they are given.
//! Delivery is fire-and-forget: a sink never returns an error and never makes
//! the caller wait on a remote service.
//!
//! - [`LogSink`] writes messages to the structured log, used when
//!   notifications are disabled
//! - [`Notifier`] logs each message and fans it out to async
//!   [`NotifyChannel`]s on spawned tasks
//! - [`WebhookChannel`] posts `{"text": ...}` to a Slack-compatible webhook

mod webhook;

pub use webhook::WebhookChannel;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Receives human-readable outcome and error messages
pub trait NotificationSink: Send + Sync {
    fn send(&self, text: &str);
}

/// Errors a notification channel can hit while delivering
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected notification with status {0}")]
    Rejected(u16),

    #[error("channel not configured: {0}")]
    NotConfigured(String),
}

/// A delivery channel (webhook, chat, pager)
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, text: &str) -> Result<(), ChannelError>;
}

/// Sink that only logs
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn send(&self, text: &str) {
        info!(event = "notification", message = %text, "Notification");
    }
}

/// Dispatches each message to every configured channel
pub struct Notifier {
    channels: Vec<Arc<dyn NotifyChannel>>,
}

impl Notifier {
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        if channels.is_empty() {
            warn!("No notification channels configured");
        } else {
            info!(channel_count = channels.len(), "Notification channels initialized");
        }
        Self { channels }
    }

    /// Build from an optional webhook URL, the only channel currently supported.
    /// A channel that cannot be built is logged and left out.
    pub fn from_webhook(webhook_url: Option<&str>) -> Self {
        let mut channels: Vec<Arc<dyn NotifyChannel>> = Vec::new();
        if let Some(url) = webhook_url {
            match WebhookChannel::new(url) {
                Ok(channel) => channels.push(Arc::new(channel)),
                Err(e) => error!(error = %e, "Failed to initialize webhook channel"),
            }
        }
        Self::with_channels(channels)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl NotificationSink for Notifier {
    fn send(&self, text: &str) {
        // Every message also lands in the log, whatever happens to delivery
        info!(event = "notification", message = %text, "Notification");

        if self.channels.is_empty() {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available, dropping notification");
                return;
            }
        };

        let text: Arc<str> = Arc::from(text);
        for channel in &self.channels {
            let channel = Arc::clone(channel);
            let text = Arc::clone(&text);
            handle.spawn(async move {
                match channel.deliver(&text).await {
                    Ok(()) => debug!(channel = channel.name(), "Notification delivered"),
                    Err(e) => error!(
                        channel = channel.name(),
                        error = %e,
                        "Failed to deliver notification"
                    ),
                }
            });
        }
    }
}
