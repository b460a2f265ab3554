//! Azure Read (Computer Vision v3.2) OCR.
//!
//! Submitting an image returns an `Operation-Location` URL; the result is
//! fetched from there once Azure reports `succeeded`. The recognised lines
//! are serialised as compact JSON and handed to the chat model, which
//! rebuilds them into markdown.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use umesao_core::error::{Error, Result};
use umesao_core::extract::{ImageUpload, TextExtractor};
use umesao_core::models::ExtractionMethod;

use super::{poll_with_retry, PollPolicy};
use crate::config::{ExtractionConfig, Secrets};
use crate::http;
use crate::openai::ChatClient;

const SERVICE: &str = "Azure Read";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Deserialize, Serialize)]
struct ReadOperation {
    status: String,
    #[serde(rename = "analyzeResult", default)]
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize, Serialize)]
struct AnalyzeResult {
    #[serde(rename = "readResults", default)]
    read_results: Vec<ReadPage>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ReadPage {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ReadLine {
    #[serde(rename = "boundingBox", default)]
    bounding_box: Vec<f64>,
    text: String,
}

pub struct AzureReadExtractor {
    client: Client,
    endpoint: String,
    key: String,
    language: String,
    poll: PollPolicy,
    chat: ChatClient,
    markdown_model: String,
}

impl AzureReadExtractor {
    /// Fails with `Configuration` when `AZURE_ENDPOINT` or `AZURE_KEY` is
    /// not set.
    pub fn new(
        config: &ExtractionConfig,
        secrets: &Secrets,
        language: &str,
        chat: ChatClient,
    ) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            endpoint: Secrets::require(&secrets.azure_endpoint, "AZURE_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
            key: Secrets::require(&secrets.azure_key, "AZURE_KEY")?.to_string(),
            language: language.to_string(),
            poll: PollPolicy::from_config(config),
            chat,
            markdown_model: config.markdown_model.clone(),
        })
    }

    /// Submit the image; returns the operation URL to poll.
    async fn submit(&self, image: &ImageUpload) -> Result<String> {
        let url = format!(
            "{}/vision/v3.2/read/analyze?language={}",
            self.endpoint, self.language
        );
        let response = self
            .client
            .post(url)
            .header(KEY_HEADER, &self.key)
            .header("Content-Type", "application/octet-stream")
            .body(image.bytes.clone())
            .send()
            .await
            .map_err(|e| http::transport(SERVICE, e))?;
        let response = http::ensure_success(SERVICE, response).await?;

        response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::external(SERVICE, "Operation-Location header missing"))
    }

    /// One fetch of the operation result.
    async fn fetch(&self, location: &str) -> Result<String> {
        let response = self
            .client
            .get(location)
            .header(KEY_HEADER, &self.key)
            .send()
            .await
            .map_err(|e| http::transport(SERVICE, e))?;
        let response = http::ensure_success(SERVICE, response).await?;
        let operation: ReadOperation = http::json_body(SERVICE, response).await?;
        read_result_text(operation)
    }
}

/// Serialise a finished operation; anything but `succeeded` is a failed
/// fetch.
fn read_result_text(operation: ReadOperation) -> Result<String> {
    if operation.status != "succeeded" {
        return Err(Error::external(
            SERVICE,
            format!("operation status is '{}'", operation.status),
        ));
    }
    serde_json::to_string(&operation)
        .map_err(|e| Error::external(SERVICE, format!("cannot serialise result: {}", e)))
}

#[async_trait]
impl TextExtractor for AzureReadExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    async fn extract(&self, image: &ImageUpload) -> Result<String> {
        let location = self.submit(image).await?;
        info!(file = %image.file_name, language = %self.language, "submitted image to Azure Read");

        let ocr = poll_with_retry("Azure Read fetch", self.poll, || self.fetch(&location)).await?;
        info!(bytes = ocr.len(), "fetched OCR result");

        self.chat.ocr_to_markdown(&self.markdown_model, &ocr).await
    }
}
