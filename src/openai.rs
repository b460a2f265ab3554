//! OpenAI chat completions: OCR-to-markdown reconstruction, translation,
//! and vision captioning.
//!
//! Markdown reconstruction and translation only accept a completion whose
//! `finish_reason` is `"stop"`; a truncated answer would silently lose
//! card content.

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use umesao_core::error::{Error, Result};

use crate::config::Secrets;
use crate::http;

const OPENAI_URL: &str = "https://api.openai.com";
const SERVICE: &str = "OpenAI chat";

const MARKDOWN_INSTRUCTION: &str = "You are a helpful assistant. Please output only the final \
Markdown without any additional explanation or commentary. Even the code block that indicates \
this is a markdown is unwanted.";

const MARKDOWN_REQUEST: &str = "Reconstruct the following OCR file into a Markdown file. If parts \
of the output look like an error, delete or modify them. You might need to change the heading or \
create lists or even tables. Here is the OCR result:\n\n";

const TRANSLATOR_INSTRUCTION: &str = "You are a professional translator. Translate the given text \
while preserving all markdown formatting exactly as it appears in the original text.";

const CAPTION_REQUEST: &str = "This is a image that is either a diagram, graph, chart or table. \
Explain what this visualization is and the insights. Output only the results as a complete \
paragraph, so this could be used as an caption.";

const CAPTION_MAX_TOKENS: u32 = 300;

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ChatClient {
    /// Fails with `Configuration` when `OPENAI_KEY` is not set.
    pub fn new(secrets: &Secrets, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http::client(timeout_secs)?,
            api_key: Secrets::require(&secrets.openai_key, "OPENAI_KEY")?.to_string(),
            base_url: OPENAI_URL.to_string(),
        })
    }

    /// Rebuild markdown from raw OCR output.
    pub async fn ocr_to_markdown(&self, model: &str, ocr: &str) -> Result<String> {
        let messages = json!([
            {"role": "assistant", "content": MARKDOWN_INSTRUCTION},
            {"role": "user", "content": format!("{}{}", MARKDOWN_REQUEST, ocr)},
        ]);
        self.complete(json!({"model": model, "messages": messages}), true)
            .await
    }

    /// Translate markdown into `language`, keeping its formatting.
    pub async fn translate(&self, model: &str, text: &str, language: &str) -> Result<String> {
        let prompt = format!(
            "Translate the following text to {}. Preserve the markdown formatting:\n\n{}",
            language, text
        );
        let messages = json!([
            {"role": "system", "content": TRANSLATOR_INSTRUCTION},
            {"role": "user", "content": prompt},
        ]);
        self.complete(json!({"model": model, "messages": messages}), true)
            .await
    }

    /// One-paragraph caption of a card photo.
    pub async fn caption_image(
        &self,
        model: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let messages = json!([{
            "role": "user",
            "content": [
                {"type": "text", "text": CAPTION_REQUEST},
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:{};base64,{}", content_type, encoded),
                        "detail": "high"
                    }
                }
            ]
        }]);
        self.complete(
            json!({"model": model, "messages": messages, "max_tokens": CAPTION_MAX_TOKENS}),
            false,
        )
        .await
    }

    async fn complete(&self, body: Value, require_stop: bool) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::transport(SERVICE, e))?;
        let response = http::ensure_success(SERVICE, response).await?;
        let parsed: ChatResponse = http::json_body(SERVICE, response).await?;
        first_content(parsed, require_stop)
    }
}

fn first_content(response: ChatResponse, require_stop: bool) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::external(SERVICE, "response has no choices"))?;

    if require_stop {
        let reason = choice.finish_reason.as_deref().unwrap_or("none");
        if reason != "stop" {
            return Err(Error::external(
                SERVICE,
                format!("finish reason is '{}', expected 'stop'", reason),
            ));
        }
    }

    match choice.message.content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(Error::external(SERVICE, "response has no content")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(value: Value) -> ChatResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_stop_completion_accepted() {
        let r = response(json!({
            "choices": [{"message": {"role": "assistant", "content": "# Card"}, "finish_reason": "stop"}]
        }));
        assert_eq!(first_content(r, true).unwrap(), "# Card");
    }

    #[test]
    fn test_truncated_completion_rejected() {
        let r = response(json!({
            "choices": [{"message": {"content": "# Ca"}, "finish_reason": "length"}]
        }));
        let err = first_content(r, true).unwrap_err();
        assert!(err.to_string().contains("length"));
    }

    #[test]
    fn test_caption_ignores_finish_reason() {
        let r = response(json!({
            "choices": [{"message": {"content": "A chart."}, "finish_reason": "length"}]
        }));
        assert_eq!(first_content(r, false).unwrap(), "A chart.");
    }

    #[test]
    fn test_empty_choices_rejected() {
        let r = response(json!({"choices": []}));
        assert!(matches!(
            first_content(r, false).unwrap_err(),
            Error::ExternalService { .. }
        ));
    }
}
