// Shared HTTP plumbing for the query-string style backends

use ddns_core::config::ServiceConfig;
use ddns_core::{Error, Result};
use std::time::Duration;

/// Request timeout for every update call
pub(crate) const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the HTTP client one backend instance uses
///
/// NoIP rejects requests without a descriptive user agent.
pub(crate) fn client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .user_agent(concat!("ddns/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// Fail with a configuration error when a required descriptor field is empty
pub(crate) fn require(service: &ServiceConfig, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::config(format!(
            "{} service for '{}' requires '{}'",
            service.service_type, service.target_domain, field
        )));
    }
    Ok(())
}

/// Send a request and return the status and body text
///
/// Transport failures are reported as the backend's error.
pub(crate) async fn send(
    service_type: &str,
    request: reqwest::RequestBuilder,
) -> Result<(reqwest::StatusCode, String)> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::backend(service_type, format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::backend(service_type, format!("Failed to read response: {}", e)))?;

    Ok((status, body))
}

/// Trim a trailing slash so paths can be appended with `format!`
pub(crate) fn normalize_base(base: impl Into<String>) -> String {
    base.into().trim_end_matches('/').to_string()
}
