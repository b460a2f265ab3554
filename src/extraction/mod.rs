//! Text extraction providers.
//!
//! | Method | Provider | Output |
//! |--------|----------|--------|
//! | `ocr` | [`azure::AzureReadExtractor`]: Azure Read v3.2, then markdown reconstruction | markdown |
//! | `mistral` | [`mistral::MistralOcrExtractor`]: Mistral OCR, then markdown reconstruction | markdown |
//! | `vision` | [`vision::VisionCaptioner`]: OpenAI vision caption | one paragraph of prose |
//!
//! Azure Read is asynchronous: the image is submitted, then the result is
//! fetched with [`poll_with_retry`]. That loop is the only retried call in
//! the pipeline.

pub mod azure;
pub mod mistral;
pub mod vision;

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use umesao_core::error::{Error, Result};
use umesao_core::extract::TextExtractor;
use umesao_core::models::ExtractionMethod;

use crate::config::{ExtractionConfig, Secrets};
use crate::openai::ChatClient;

/// Bounded polling schedule: `attempts` fetches, each preceded by `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            attempts: config.poll_attempts.max(1),
            interval: Duration::from_secs(config.poll_interval_secs),
        }
    }
}

/// Wait, fetch, and repeat until `fetch` succeeds or attempts run out.
///
/// Every failed fetch is logged. Exhaustion yields
/// [`Error::RetryExhausted`] carrying the last failure.
pub async fn poll_with_retry<T, F, Fut>(operation: &str, policy: PollPolicy, mut fetch: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = String::from("no attempt made");
    for attempt in 1..=policy.attempts {
        tokio::time::sleep(policy.interval).await;
        match fetch().await {
            Ok(value) => {
                debug!(operation, attempt, "poll succeeded");
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    operation,
                    attempt,
                    attempts = policy.attempts,
                    error = %e,
                    "poll attempt did not succeed"
                );
                last_error = e.to_string();
            }
        }
    }
    Err(Error::RetryExhausted {
        operation: operation.to_string(),
        attempts: policy.attempts,
        last_error,
    })
}

/// Build the extractor for `method`.
///
/// `language` overrides `extraction.language` for Azure Read.
pub fn create_extractor(
    method: ExtractionMethod,
    config: &ExtractionConfig,
    secrets: &Secrets,
    language: Option<&str>,
) -> Result<Box<dyn TextExtractor>> {
    let chat = ChatClient::new(secrets, config.timeout_secs)?;
    match method {
        ExtractionMethod::Ocr => Ok(Box::new(azure::AzureReadExtractor::new(
            config,
            secrets,
            language.unwrap_or(&config.language),
            chat,
        )?)),
        ExtractionMethod::Mistral => Ok(Box::new(mistral::MistralOcrExtractor::new(
            config, secrets, chat,
        )?)),
        ExtractionMethod::Vision => Ok(Box::new(vision::VisionCaptioner::new(config, chat))),
    }
}
