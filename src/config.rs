//! Configuration parsing and validation.
//!
//! Settings come from a TOML file (default `config/ume.toml`). Secrets never
//! live in the file; they are read from the environment, optionally seeded
//! from a `.env` file, through [`Secrets`].
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/ume.sqlite"
//!
//! [storage]
//! backend = "fs"
//! root = "./data/blobs"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [extraction]
//! default_method = "ocr"
//! language = "ja"
//!
//! [retrieval]
//! top_k = 10
//! policy = "chunk-first"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use umesao_core::models::ExtractionMethod;
use umesao_core::object_store::Buckets;
use umesao_core::search::{RankingPolicy, SearchParams};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub editor: EditorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// `"fs"` or `"s3"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Blob directory for the `fs` backend.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// S3 / MinIO endpoint, e.g. `https://minio.example.com`.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_image_bucket")]
    pub image_bucket: String,
    #[serde(default = "default_markdown_bucket")]
    pub markdown_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            root: default_storage_root(),
            endpoint_url: None,
            region: default_region(),
            image_bucket: default_image_bucket(),
            markdown_bucket: default_markdown_bucket(),
        }
    }
}

impl StorageConfig {
    pub fn buckets(&self) -> Buckets {
        Buckets {
            images: self.image_bucket.clone(),
            markdown: self.markdown_bucket.clone(),
        }
    }
}

fn default_backend() -> String {
    "fs".to_string()
}
fn default_storage_root() -> PathBuf {
    PathBuf::from("./data/blobs")
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_image_bucket() -> String {
    "card-images".to_string()
}
fn default_markdown_bucket() -> String {
    "card-markdown".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"disabled"`, `"openai"`, `"ollama"`, or `"local"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Base URL override (OpenAI-compatible endpoint or Ollama server).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// `"ocr"`, `"mistral"`, or `"vision"`.
    #[serde(default = "default_method")]
    pub default_method: String,
    /// Azure Read language hint.
    #[serde(default = "default_language")]
    pub language: String,
    /// Chat model that rebuilds markdown from raw OCR output.
    #[serde(default = "default_markdown_model")]
    pub markdown_model: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_method: default_method(),
            language: default_language(),
            markdown_model: default_markdown_model(),
            vision_model: default_vision_model(),
            poll_attempts: default_poll_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

impl ExtractionConfig {
    pub fn method(&self) -> Result<ExtractionMethod> {
        Ok(self.default_method.parse()?)
    }
}

fn default_method() -> String {
    "ocr".to_string()
}
fn default_language() -> String {
    "ja".to_string()
}
fn default_markdown_model() -> String {
    "o1-mini".to_string()
}
fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_poll_attempts() -> u32 {
    3
}
fn default_poll_interval_secs() -> u64 {
    3
}
fn default_extraction_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// `"chunk-first"` or `"card-best"`.
    #[serde(default = "default_policy")]
    pub policy: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            policy: default_policy(),
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> Result<SearchParams> {
        Ok(SearchParams {
            top_k: self.top_k,
            policy: self.policy.parse::<RankingPolicy>()?,
        })
    }
}

fn default_top_k() -> usize {
    10
}
fn default_policy() -> String {
    "chunk-first".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslationConfig {
    #[serde(default = "default_translation_model")]
    pub model: String,
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            model: default_translation_model(),
            timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

fn default_translation_model() -> String {
    "gpt-4o".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EditorConfig {
    /// Editor command; falls back to `$EDITOR`, then `vi`.
    #[serde(default)]
    pub command: Option<String>,
}

impl EditorConfig {
    pub fn resolve(&self) -> String {
        self.command
            .clone()
            .or_else(|| std::env::var("EDITOR").ok().filter(|e| !e.trim().is_empty()))
            .unwrap_or_else(|| "vi".to_string())
    }
}

/// Credentials read from the environment.
#[derive(Clone, Default)]
pub struct Secrets {
    pub openai_key: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_key: Option<String>,
    pub mistral_key: Option<String>,
    pub minio_user: Option<String>,
    pub minio_password: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| if v.is_some() { "set" } else { "unset" };
        f.debug_struct("Secrets")
            .field("openai_key", &set(&self.openai_key))
            .field("azure_endpoint", &self.azure_endpoint)
            .field("azure_key", &set(&self.azure_key))
            .field("mistral_key", &set(&self.mistral_key))
            .field("minio_user", &self.minio_user)
            .field("minio_password", &set(&self.minio_password))
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            openai_key: var("OPENAI_KEY"),
            azure_endpoint: var("AZURE_ENDPOINT"),
            azure_key: var("AZURE_KEY"),
            mistral_key: var("MISTRAL_KEY"),
            minio_user: var("MINIO_USER"),
            minio_password: var("MINIO_PASSWORD"),
        }
    }

    /// Return a secret or a `Configuration` error naming its variable.
    pub fn require<'a>(
        value: &'a Option<String>,
        name: &str,
    ) -> umesao_core::Result<&'a str> {
        value.as_deref().ok_or_else(|| {
            umesao_core::Error::Configuration(format!("environment variable {} is not set", name))
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.storage.backend.as_str() {
        "fs" => {}
        "s3" => {
            if config.storage.endpoint_url.is_none() {
                bail!("storage.endpoint_url is required when backend is 's3'");
            }
        }
        other => bail!(
            "Unknown storage backend: '{}'. Must be fs or s3.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.is_enabled() && config.embedding.dims == 0 {
        bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }

    config
        .extraction
        .method()
        .context("Invalid extraction.default_method")?;
    if config.extraction.poll_attempts < 1 {
        bail!("extraction.poll_attempts must be >= 1");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    config
        .retrieval
        .params()
        .context("Invalid retrieval.policy")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let f = write_config("[db]\npath = \"x.sqlite\"\n");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.storage.backend, "fs");
        assert_eq!(cfg.storage.image_bucket, "card-images");
        assert_eq!(cfg.storage.markdown_bucket, "card-markdown");
        assert_eq!(cfg.embedding.provider, "disabled");
        assert_eq!(cfg.embedding.model, "text-embedding-3-small");
        assert_eq!(cfg.embedding.dims, 1536);
        assert_eq!(cfg.extraction.poll_attempts, 3);
        assert_eq!(cfg.extraction.poll_interval_secs, 3);
        assert_eq!(cfg.extraction.markdown_model, "o1-mini");
        assert_eq!(cfg.translation.model, "gpt-4o");
        let params = cfg.retrieval.params().unwrap();
        assert_eq!(params.top_k, 10);
        assert_eq!(params.policy, RankingPolicy::ChunkFirst);
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let f = write_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"bert\"\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let f = write_config("[db]\npath = \"x\"\n[retrieval]\ntop_k = 0\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_rejects_bad_policy_and_method() {
        let f = write_config("[db]\npath = \"x\"\n[retrieval]\npolicy = \"sum\"\n");
        assert!(load_config(f.path()).is_err());
        let f = write_config("[db]\npath = \"x\"\n[extraction]\ndefault_method = \"tesseract\"\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_s3_needs_endpoint() {
        let f = write_config("[db]\npath = \"x\"\n[storage]\nbackend = \"s3\"\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("endpoint_url"));
    }

    #[test]
    fn test_require_missing_secret_is_configuration_error() {
        let secrets = Secrets::default();
        let err = Secrets::require(&secrets.openai_key, "OPENAI_KEY").unwrap_err();
        assert!(matches!(err, umesao_core::Error::Configuration(_)));
        assert!(err.to_string().contains("OPENAI_KEY"));
    }

    #[test]
    fn test_secrets_debug_hides_values() {
        let secrets = Secrets {
            openai_key: Some("sk-very-secret".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", secrets).contains("sk-very-secret"));
    }
}
