//! Wiring shared by every command: database, blob backend, and providers.

use anyhow::{bail, Context, Result};

use umesao_core::embedding::EmbeddingProvider;
use umesao_core::extract::TextExtractor;
use umesao_core::lifecycle::CardManager;
use umesao_core::models::ExtractionMethod;
use umesao_core::object_store::ObjectStore;

use crate::config::{Config, Secrets, StorageConfig};
use crate::db;
use crate::embedding::create_provider;
use crate::extraction::create_extractor;
use crate::migrate;
use crate::object_store_fs::FsObjectStore;
use crate::object_store_s3::S3ObjectStore;
use crate::sqlite_store::SqliteStore;

pub struct App {
    pub config: Config,
    pub secrets: Secrets,
    pub store: SqliteStore,
    pub objects: Box<dyn ObjectStore>,
}

impl App {
    /// Connect to the database (migrating it) and the blob backend.
    pub async fn open(config: &Config) -> Result<Self> {
        let secrets = Secrets::from_env();
        let pool = db::connect(config).await?;
        migrate::migrate(&pool).await?;
        let objects = open_object_store(&config.storage, &secrets)?;
        Ok(Self {
            config: config.clone(),
            secrets,
            store: SqliteStore::new(pool),
            objects,
        })
    }

    pub fn manager(&self) -> CardManager<'_> {
        CardManager::new(
            &self.store,
            self.objects.as_ref(),
            self.config.storage.buckets(),
        )
    }

    pub fn embedder(&self) -> Result<Box<dyn EmbeddingProvider>> {
        Ok(create_provider(&self.config.embedding, &self.secrets)?)
    }

    pub fn extractor(
        &self,
        method: ExtractionMethod,
        language: Option<&str>,
    ) -> Result<Box<dyn TextExtractor>> {
        Ok(create_extractor(
            method,
            &self.config.extraction,
            &self.secrets,
            language,
        )?)
    }
}

pub fn open_object_store(config: &StorageConfig, secrets: &Secrets) -> Result<Box<dyn ObjectStore>> {
    match config.backend.as_str() {
        "fs" => Ok(Box::new(FsObjectStore::new(&config.root))),
        "s3" => Ok(Box::new(
            S3ObjectStore::new(config, secrets).context("Failed to configure S3 storage")?,
        )),
        other => bail!("Unknown storage backend: '{}'", other),
    }
}
