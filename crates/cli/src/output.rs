//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use remediation_lib::{HandlerResponse, ResponseStatus};
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "remediation_executed" | "healthy" | "ready" => status.green().to_string(),
        "degraded" | "rejected" | "skipped" => status.yellow().to_string(),
        "remediation_failed" | "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

fn status_label(status: ResponseStatus) -> &'static str {
    match status {
        ResponseStatus::RemediationExecuted => "remediation_executed",
        ResponseStatus::RemediationFailed => "remediation_failed",
        ResponseStatus::Rejected => "rejected",
    }
}

/// Print a handler response in the requested format
pub fn print_response(response: &HandlerResponse, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?);
        }
        OutputFormat::Table => {
            let mut rows = vec![FieldRow {
                field: "Status".to_string(),
                value: color_status(status_label(response.status)),
            }];

            if let Some(outcome) = &response.outcome {
                rows.push(FieldRow {
                    field: "Kind".to_string(),
                    value: outcome.kind.to_string(),
                });
                rows.push(FieldRow {
                    field: "Target".to_string(),
                    value: outcome.target.clone(),
                });
                rows.push(FieldRow {
                    field: "Change".to_string(),
                    value: outcome
                        .applied_change
                        .as_ref()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                });
                if let Some(failure) = outcome.failure {
                    rows.push(FieldRow {
                        field: "Failure".to_string(),
                        value: failure.as_str().red().to_string(),
                    });
                }
                rows.push(FieldRow {
                    field: "Message".to_string(),
                    value: outcome.message.clone(),
                });
            }
            if let Some(reason) = &response.reason {
                rows.push(FieldRow {
                    field: "Reason".to_string(),
                    value: reason.clone(),
                });
            }

            println!("{}", Table::new(rows).with(Style::rounded()));

            match response.status {
                ResponseStatus::RemediationExecuted => print_success("Remediation executed"),
                ResponseStatus::RemediationFailed => print_error("Remediation failed"),
                ResponseStatus::Rejected => print_warning("Event rejected"),
            }
        }
    }
    Ok(())
}
