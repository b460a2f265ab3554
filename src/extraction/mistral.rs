//! Mistral OCR. The image goes up inline as a base64 data URL; the
//! returned page markdown is then tidied by the chat model like Azure
//! output.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use umesao_core::error::{Error, Result};
use umesao_core::extract::{ImageUpload, TextExtractor};
use umesao_core::models::ExtractionMethod;

use crate::config::{ExtractionConfig, Secrets};
use crate::http;
use crate::openai::ChatClient;

const SERVICE: &str = "Mistral OCR";
const MISTRAL_OCR_URL: &str = "https://api.mistral.ai/v1/ocr";
const MISTRAL_OCR_MODEL: &str = "mistral-ocr-latest";

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    #[serde(default)]
    markdown: String,
}

pub struct MistralOcrExtractor {
    client: Client,
    key: String,
    chat: ChatClient,
    markdown_model: String,
}

impl MistralOcrExtractor {
    /// Fails with `Configuration` when `MISTRAL_KEY` is not set.
    pub fn new(config: &ExtractionConfig, secrets: &Secrets, chat: ChatClient) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            key: Secrets::require(&secrets.mistral_key, "MISTRAL_KEY")?.to_string(),
            chat,
            markdown_model: config.markdown_model.clone(),
        })
    }

    async fn ocr(&self, image: &ImageUpload) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        let body = serde_json::json!({
            "model": MISTRAL_OCR_MODEL,
            "document": {
                "type": "image_url",
                "image_url": format!("data:{};base64,{}", image.content_type, encoded),
            }
        });

        let response = self
            .client
            .post(MISTRAL_OCR_URL)
            .bearer_auth(&self.key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::transport(SERVICE, e))?;
        let response = http::ensure_success(SERVICE, response).await?;
        let parsed: OcrResponse = http::json_body(SERVICE, response).await?;
        ocr_text(parsed)
    }
}

/// Page markdown joined by blank lines; older responses carry a flat `text`.
fn ocr_text(response: OcrResponse) -> Result<String> {
    let pages: Vec<&str> = response
        .pages
        .iter()
        .map(|p| p.markdown.trim())
        .filter(|m| !m.is_empty())
        .collect();
    if !pages.is_empty() {
        return Ok(pages.join("\n\n"));
    }
    match response.text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(Error::external(SERVICE, "response contains no text")),
    }
}

#[async_trait]
impl TextExtractor for MistralOcrExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Mistral
    }

    async fn extract(&self, image: &ImageUpload) -> Result<String> {
        let ocr = self.ocr(image).await?;
        info!(file = %image.file_name, chars = ocr.chars().count(), "fetched Mistral OCR result");
        self.chat.ocr_to_markdown(&self.markdown_model, &ocr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_are_joined() {
        let r: OcrResponse = serde_json::from_value(serde_json::json!({
            "pages": [
                {"index": 0, "markdown": "# One\n"},
                {"index": 1, "markdown": "  "},
                {"index": 2, "markdown": "two"}
            ],
            "model": "mistral-ocr-latest"
        }))
        .unwrap();
        assert_eq!(ocr_text(r).unwrap(), "# One\n\ntwo");
    }

    #[test]
    fn test_flat_text_fallback() {
        let r: OcrResponse = serde_json::from_value(serde_json::json!({"text": "hello"})).unwrap();
        assert_eq!(ocr_text(r).unwrap(), "hello");
    }

    #[test]
    fn test_empty_response_is_error() {
        let r: OcrResponse = serde_json::from_value(serde_json::json!({"pages": []})).unwrap();
        assert!(matches!(
            ocr_text(r).unwrap_err(),
            Error::ExternalService { .. }
        ));
    }
}
