use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::config::Config;

/// Asks the server to fire a synthetic donation. The response body is only
/// logged; its shape is up to the server.
pub async fn trigger(config: &Config) -> Result<Value> {
    let url = config.test_donation_url()?;
    info!(%url, "Requesting test donation");

    let response = reqwest::Client::new()
        .post(url.clone())
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?
        .error_for_status()
        .with_context(|| format!("{url} rejected the test donation"))?;
    let body: Value = response
        .json()
        .await
        .context("test donation response is not json")?;

    info!(response = %body, "Test donation sent");
    Ok(body)
}
