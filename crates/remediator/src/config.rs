//! Remediator configuration
//!
//! Loaded from an optional YAML file (path in `REMEDIATOR_CONFIG`, default
//! `remediator.yaml`) overlaid with `REMEDIATOR_*` environment variables.
//! Nested keys use `__`, e.g. `REMEDIATOR_REMEDIATION__GUARD_POD_STATE=true`.

use anyhow::{Context, Result};
use remediation_lib::RemediationConfig;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "remediator.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct RemediatorConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Port for the events, health and metrics server
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Log mutations instead of sending them
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub remediation: RemediationConfig,

    #[serde(default)]
    pub notify: NotifySettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifySettings {
    /// Slack-compatible incoming webhook
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default)]
    pub disabled: bool,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "fault-remediator".to_string())
}

fn default_api_port() -> u16 {
    8080
}

impl Default for RemediatorConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            dry_run: false,
            remediation: RemediationConfig::default(),
            notify: NotifySettings::default(),
        }
    }
}

impl RemediatorConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("REMEDIATOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("REMEDIATOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::from_builder(builder)
    }

    /// Deserialize and validate whatever sources `builder` holds
    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config: Self = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Invalid remediator configuration")?;

        config
            .remediation
            .validate()
            .context("Invalid remediation settings")?;
        Ok(config)
    }

    /// Webhook URL, treating an empty string as unset
    pub fn webhook_url(&self) -> Option<&str> {
        self.notify
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};
    use remediation_lib::MemoryQuantity;
    use std::time::Duration;

    fn from_yaml(yaml: &str) -> Result<RemediatorConfig> {
        RemediatorConfig::from_builder(
            config::Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)),
        )
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = from_yaml("{}").unwrap();
        assert_eq!(config.api_port, 8080);
        assert!(!config.dry_run);
        assert_eq!(config.remediation, RemediationConfig::default());
        assert_eq!(config.webhook_url(), None);
    }

    #[test]
    fn test_file_overrides() {
        let config = from_yaml(
            r#"
api_port: 9090
dry_run: true
remediation:
  cluster_timeout_secs: 3
  default_memory_limit: 256Mi
  guard_pod_state: true
  ladder:
    steps:
      - from: 256Mi
        to: 512Mi
    fallback: 4Gi
notify:
  webhook_url: "https://hooks.example.com/services/T000/B000/XXXX"
"#,
        )
        .unwrap();

        assert_eq!(config.api_port, 9090);
        assert!(config.dry_run);
        assert_eq!(config.remediation.cluster_timeout(), Duration::from_secs(3));
        assert_eq!(
            config.remediation.default_memory_limit,
            MemoryQuantity::mebibytes(256)
        );
        assert!(config.remediation.guard_pod_state);
        assert!(!config.remediation.guard_node_state);
        assert_eq!(
            config
                .remediation
                .ladder
                .next(&MemoryQuantity::mebibytes(256)),
            MemoryQuantity::mebibytes(512)
        );
        assert_eq!(
            config.webhook_url(),
            Some("https://hooks.example.com/services/T000/B000/XXXX")
        );
    }

    #[test]
    fn test_invalid_quantity_fails() {
        let result = from_yaml("remediation:\n  default_memory_limit: lots\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_shrinking_ladder_fails() {
        let result = from_yaml(
            "remediation:\n  ladder:\n    steps:\n      - from: 2Gi\n        to: 1Gi\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_cluster_timeout_fails() {
        let result = from_yaml("remediation:\n  cluster_timeout_secs: 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_webhook_is_unset() {
        let config = from_yaml("notify:\n  webhook_url: \"  \"\n").unwrap();
        assert_eq!(config.webhook_url(), None);
    }
}
