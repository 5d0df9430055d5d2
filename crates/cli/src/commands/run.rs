//! `remctl run`: remediate an event locally with the current kubeconfig

use anyhow::{Context, Result};
use colored::Colorize;
use remediation_lib::{
    ClusterClient, Dispatcher, DryRunClusterClient, HandlerResponse, KubeClusterClient,
    NotificationSink, RemediationConfig,
};
use std::sync::Arc;

use super::EventArgs;
use crate::config::kubeconfig_path;
use crate::output::{print_info, print_response, OutputFormat};

/// Prints notifications as they happen
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn send(&self, text: &str) {
        println!("{} {}", "»".cyan().bold(), text);
    }
}

pub struct RunOptions<'a> {
    pub kubeconfig: Option<&'a str>,
    pub dry_run: bool,
    pub guarded: bool,
    pub timeout_secs: u64,
}

pub async fn run_event(event: &EventArgs, options: RunOptions<'_>, format: OutputFormat) -> Result<()> {
    let payload = event.to_payload()?;

    let path = kubeconfig_path(options.kubeconfig)?;
    let kube = KubeClusterClient::from_kubeconfig(&path)
        .await
        .with_context(|| format!("Failed to load kubeconfig {}", path.display()))?;

    let client: Arc<dyn ClusterClient> = if options.dry_run {
        print_info("Dry run: mutations are logged, not sent");
        Arc::new(DryRunClusterClient::new(Arc::new(kube)))
    } else {
        Arc::new(kube)
    };

    let mut config = if options.guarded {
        RemediationConfig::guarded()
    } else {
        RemediationConfig::default()
    };
    config.cluster_timeout_secs = options.timeout_secs;
    config.validate().context("Invalid remediation settings")?;

    let dispatcher = Dispatcher::new(client, Arc::new(ConsoleSink), config);
    let response = HandlerResponse::from(dispatcher.handle(&payload).await);

    print_response(&response, format)?;
    if !response.succeeded {
        anyhow::bail!("Remediation did not succeed");
    }
    Ok(())
}
