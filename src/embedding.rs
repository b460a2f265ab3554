//! Embedding provider implementations.
//!
//! - **[`DisabledProvider`]**: fails every call; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: `POST /v1/embeddings` with `encoding_format = "float"`
//!   and an explicit `dimensions`.
//! - **[`OllamaProvider`]**: `POST /api/embed` on a local Ollama server.
//! - **`LocalProvider`**: fastembed, behind the `local-embeddings` feature.
//!
//! Providers tag each vector with its input index; callers go through
//! [`umesao_core::embedding::embed_in_order`] to restore order and check
//! dimensions. There are no retries: the first failed call ends the run.
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use umesao::config::{EmbeddingConfig, Secrets};
//! # use umesao::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config, &Secrets::default()).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use umesao_core::embedding::{EmbeddingProvider, IndexedEmbedding};
use umesao_core::error::{Error, Result};

use crate::config::{EmbeddingConfig, Secrets};
use crate::http;

const OPENAI_URL: &str = "https://api.openai.com";
const OLLAMA_URL: &str = "http://localhost:11434";

// ============ Disabled Provider ============

pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
        Err(Error::Configuration(
            "embedding provider is disabled; set [embedding] provider in the config".into(),
        ))
    }
}

// ============ OpenAI Provider ============

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    dims: usize,
}

impl OpenAIProvider {
    /// Fails with `Configuration` when `OPENAI_KEY` is not set.
    pub fn new(config: &EmbeddingConfig, secrets: &Secrets) -> Result<Self> {
        let api_key = Secrets::require(&secrets.openai_key, "OPENAI_KEY")?.to_string();
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            api_key,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_URL.to_string()),
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

fn parse_openai_response(body: OpenAIEmbeddingResponse) -> Vec<IndexedEmbedding> {
    body.data
        .into_iter()
        .map(|d| IndexedEmbedding {
            index: d.index,
            vector: d.embedding,
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
        const SERVICE: &str = "OpenAI embeddings";
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "encoding_format": "float",
            "dimensions": self.dims,
        });

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::transport(SERVICE, e))?;
        let response = http::ensure_success(SERVICE, response).await?;
        let parsed: OpenAIEmbeddingResponse = http::json_body(SERVICE, response).await?;
        Ok(parse_openai_response(parsed))
    }
}

// ============ Ollama Provider ============

/// Requires Ollama running with the configured model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    client: Client,
    url: String,
    model: String,
    dims: usize,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama answers positionally.
fn parse_ollama_response(body: OllamaEmbedResponse) -> Vec<IndexedEmbedding> {
    body.embeddings
        .into_iter()
        .enumerate()
        .map(|(index, vector)| IndexedEmbedding { index, vector })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
        const SERVICE: &str = "Ollama embeddings";
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                Error::external(
                    SERVICE,
                    format!("connection error (is Ollama running at {}?): {}", self.url, e),
                )
            })?;
        let response = http::ensure_success(SERVICE, response).await?;
        let parsed: OllamaEmbedResponse = http::json_body(SERVICE, response).await?;
        Ok(parse_ollama_response(parsed))
    }
}

// ============ Local Provider (fastembed) ============

/// Offline embeddings; the model is downloaded on first use.
#[cfg(feature = "local-embeddings")]
pub struct LocalProvider {
    model: String,
    dims: usize,
    fastembed_model: fastembed::EmbeddingModel,
}

#[cfg(feature = "local-embeddings")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            fastembed_model: config_to_fastembed_model(&config.model)?,
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[cfg(feature = "local-embeddings")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(Error::Configuration(format!(
            "unsupported local embedding model '{}'",
            other
        ))),
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
        let fastembed_model = self.fastembed_model.clone();
        let texts = texts.to_vec();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
            )
            .map_err(|e| Error::external("local embeddings", format!("model init failed: {}", e)))?;
            model
                .embed(texts, None)
                .map_err(|e| Error::external("local embeddings", e))
        })
        .await
        .map_err(|e| Error::external("local embeddings", e))??;

        Ok(vectors
            .into_iter()
            .enumerate()
            .map(|(index, vector)| IndexedEmbedding { index, vector })
            .collect())
    }
}

/// Instantiate the configured provider.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"local"` | `LocalProvider` (feature `local-embeddings`) |
pub fn create_provider(
    config: &EmbeddingConfig,
    secrets: &Secrets,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config, secrets)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Box::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(Error::Configuration(
            "local embedding provider requires building with --features local-embeddings".into(),
        )),
        other => Err(Error::Configuration(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}
