//! `remctl health`: show remediator health and readiness

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use tabled::{settings::Style, Table, Tabled};

use crate::client::ApiClient;
use crate::output::{color_status, print_success, print_warning, OutputFormat};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health) = client.health().await?;
    let (_, readiness) = client.readiness().await?;

    match format {
        OutputFormat::Json => {
            let combined = json!({ "health": health, "readiness": readiness });
            println!("{}", serde_json::to_string_pretty(&combined)?);
        }
        OutputFormat::Table => {
            println!("{}", "Remediator Health".bold());
            println!("{}", "=".repeat(40));
            let overall = serde_json::to_value(health.status)?;
            println!(
                "Overall: {}",
                color_status(overall.as_str().unwrap_or("unknown"))
            );
            println!();

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| {
                    let status = serde_json::to_value(component.status)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_else(|| "unknown".to_string());
                    ComponentRow {
                        component: name.clone(),
                        status: color_status(&status),
                        message: component.message.clone().unwrap_or_else(|| "-".to_string()),
                    }
                })
                .collect();
            rows.sort_by(|a, b| a.component.cmp(&b.component));

            if !rows.is_empty() {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }

            if readiness.ready {
                print_success("Ready to accept events");
            } else {
                print_warning(&format!(
                    "Not ready: {}",
                    readiness.reason.as_deref().unwrap_or("unknown reason")
                ));
            }
        }
    }

    Ok(())
}
