//! `remctl send`: post an event to a running remediator

use anyhow::Result;

use super::EventArgs;
use crate::client::ApiClient;
use crate::output::{print_info, print_response, OutputFormat};

pub async fn send_event(
    client: &ApiClient,
    event: &EventArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let payload = event.to_payload()?;
    if verbose {
        print_info(&format!("Sending {}", payload));
    }

    let (status, response) = client.post_event(&payload).await?;
    if verbose {
        print_info(&format!("HTTP {}", status));
    }

    print_response(&response, format)?;
    if !response.succeeded {
        anyhow::bail!("Remediator answered with HTTP {}", status);
    }
    Ok(())
}
