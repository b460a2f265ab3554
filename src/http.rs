//! Shared HTTP plumbing for external providers.
//!
//! Every client carries an explicit timeout. Calls fail fast: transport
//! errors, non-2xx statuses, and unparseable bodies all become
//! [`Error::ExternalService`] naming the provider.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use umesao_core::error::{Error, Result};

/// Longest error body echoed back in a message.
const MAX_ERROR_BODY: usize = 500;

pub fn client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))
}

pub fn transport(service: &str, err: reqwest::Error) -> Error {
    Error::external(service, format!("request failed: {}", err))
}

/// Pass through 2xx responses; turn anything else into an error carrying
/// the status and a prefix of the body.
pub async fn ensure_success(service: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    Err(Error::external(service, format!("HTTP {}: {}", status, body)))
}

pub async fn json_body<T: DeserializeOwned>(service: &str, response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| Error::external(service, format!("malformed response: {}", e)))
}
