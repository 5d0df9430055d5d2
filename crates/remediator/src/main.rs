//! Fault remediator
//!
//! Receives fault events over HTTP and applies the matching corrective
//! action to the cluster it runs in.

use anyhow::{Context, Result};
use remediation_lib::{
    cluster::{ClusterClient, DryRunClusterClient, KubeClusterClient},
    health::{components, HealthRegistry},
    notify::{LogSink, NotificationSink, Notifier},
    observability::{RemediationMetrics, StructuredLogger},
    Dispatcher,
};
use remediator::{api, config::RemediatorConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const REMEDIATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting fault remediator");

    let config = RemediatorConfig::load()?;
    info!(
        instance = %config.instance_name,
        port = config.api_port,
        dry_run = config.dry_run,
        "Remediator configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::DISPATCHER).await;
    health_registry.register(components::CLUSTER_CLIENT).await;
    health_registry.register(components::NOTIFIER).await;

    // Register collectors before the first scrape
    let _metrics = RemediationMetrics::new();

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(REMEDIATOR_VERSION, config.dry_run);

    let kube = KubeClusterClient::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let client: Arc<dyn ClusterClient> = if config.dry_run {
        Arc::new(DryRunClusterClient::new(Arc::new(kube)))
    } else {
        Arc::new(kube)
    };

    let notifier: Arc<dyn NotificationSink> = if config.notify.disabled {
        info!("Notifications disabled, outcomes are only logged");
        Arc::new(LogSink)
    } else {
        let notifier = Notifier::from_webhook(config.webhook_url());
        if notifier.channel_count() == 0 {
            health_registry
                .set_degraded(components::NOTIFIER, "No notification channel configured")
                .await;
        }
        Arc::new(notifier)
    };

    let dispatcher = Dispatcher::new(client, notifier, config.remediation.clone())
        .with_logger(logger.clone())
        .with_health(health_registry.clone());

    let kinds = dispatcher.registered_kinds();
    if kinds.is_empty() {
        warn!("No remediation actions registered");
        health_registry
            .set_unhealthy(components::DISPATCHER, "No remediation actions registered")
            .await;
    } else {
        info!(kinds = ?kinds, "Remediation actions registered");
    }

    let app_state = Arc::new(api::AppState::new(dispatcher, health_registry.clone()));

    health_registry.set_ready(true).await;

    let shutdown_logger = logger.clone();
    api::serve(config.api_port, app_state, async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_logger.log_shutdown("SIGINT received");
        }
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
