//! Card lifecycle: upload, versioned edits, lookup support, and cascading
//! delete across the relational store and the blob store.
//!
//! [`CardManager`] holds explicit handles to both stores. Providers
//! (extractor, embedder) are passed per operation so read-only paths such
//! as download and delete never need network credentials.
//!
//! # Upload
//!
//! 1. Allocate a card id.
//! 2. Put the image blob and insert its Image row.
//! 3. Extract text with the chosen extractor.
//! 4. Ingest version 1: version row, markdown blob, chunk rows.
//!
//! A failure after step 1 rolls the card back with a best-effort delete.
//!
//! # Edit
//!
//! The edited text is compared with the content that was downloaded. An
//! identical hash ends the edit as [`EditOutcome::Unchanged`] without
//! touching either store. Otherwise the next version (latest + 1) is
//! ingested; older versions and their chunks stay untouched. A version
//! whose blob or chunks fail to write is removed again, so a retried edit
//! starts from the previous version.
//!
//! # Delete
//!
//! Blob removal is best-effort cleanup: failures are logged and counted,
//! never fatal. The database cascade delete is authoritative.

use serde::Serialize;
use tracing::{info, warn};

use crate::chunk::{chunk, ChunkMethod};
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::extract::{ImageUpload, TextExtractor};
use crate::index::embed_and_store;
use crate::models::{image_key, markdown_key, CardId, DocumentVersion, Image, NewImage};
use crate::object_store::{Buckets, ObjectStore, MARKDOWN_CONTENT_TYPE};
use crate::store::Store;
use crate::version::{content_hash, next_version, should_create_new_version, FIRST_VERSION};

/// Outcome of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub card_id: CardId,
    pub image_key: String,
    pub version: i64,
    pub chunks_total: usize,
    pub chunks_stored: usize,
    pub markdown: String,
}

/// Markdown of one version as fetched from the blob store.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownSnapshot {
    pub card_id: CardId,
    pub version: i64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EditOutcome {
    /// Edited bytes hash the same as the downloaded ones; nothing written.
    Unchanged { version: i64 },
    /// A new version was ingested.
    Created { version: i64, chunks_stored: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteReport {
    pub blobs_deleted: usize,
    pub blob_failures: usize,
}

/// Result of ingesting one version.
#[derive(Debug, Clone)]
struct Ingested {
    version: i64,
    chunks_total: usize,
    chunks_stored: usize,
}

pub struct CardManager<'a> {
    store: &'a dyn Store,
    objects: &'a dyn ObjectStore,
    buckets: Buckets,
}

impl<'a> CardManager<'a> {
    pub fn new(store: &'a dyn Store, objects: &'a dyn ObjectStore, buckets: Buckets) -> Self {
        Self {
            store,
            objects,
            buckets,
        }
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// Allocate a new card with no dependent rows.
    pub async fn create_card(&self) -> Result<CardId> {
        self.store.create_card().await
    }

    /// Run the full upload pipeline for one card photo.
    pub async fn upload(
        &self,
        image: &ImageUpload,
        extractor: &dyn TextExtractor,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<UploadReport> {
        let card_id = self.create_card().await?;
        info!(card = %card_id, file = %image.file_name, "created card");

        match self.populate(card_id, image, extractor, embedder).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(card = %card_id, error = %e, "upload failed, rolling back card");
                if let Err(cleanup) = self.delete(card_id).await {
                    warn!(card = %card_id, error = %cleanup, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn populate(
        &self,
        card_id: CardId,
        image: &ImageUpload,
        extractor: &dyn TextExtractor,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<UploadReport> {
        let key = image_key(card_id, &image.file_name);
        self.objects
            .put(
                &self.buckets.images,
                &key,
                image.bytes.clone(),
                &image.content_type,
            )
            .await?;
        let method = extractor.method();
        self.store
            .insert_image(&NewImage {
                card_id,
                filename: key.clone(),
                method,
            })
            .await?;
        info!(card = %card_id, key = %key, "stored image");

        let markdown = extractor.extract(image).await?;
        info!(card = %card_id, method = %method, chars = markdown.chars().count(), "extracted text");

        let ingested = self
            .ingest(card_id, FIRST_VERSION, &markdown, method.chunk_method(), embedder)
            .await?;

        Ok(UploadReport {
            card_id,
            image_key: key,
            version: ingested.version,
            chunks_total: ingested.chunks_total,
            chunks_stored: ingested.chunks_stored,
            markdown,
        })
    }

    /// Store one version: version row, markdown blob, then chunk rows.
    ///
    /// The version row goes first so a writer that lost the race for this
    /// version number fails before it can overwrite the winner's blob. If a
    /// later step fails, the row (with any chunks) and the blob are removed
    /// again so the previous version stays the searchable one.
    async fn ingest(
        &self,
        card_id: CardId,
        version: i64,
        content: &str,
        method: ChunkMethod,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Ingested> {
        let row = self
            .store
            .insert_version(card_id, version, &content_hash(content.as_bytes()))
            .await?;

        match self.write_version(&row, content, method, embedder).await {
            Ok(ingested) => Ok(ingested),
            Err(e) => {
                warn!(card = %card_id, version, error = %e, "ingest failed, removing version");
                self.discard_version(card_id, row.version).await;
                Err(e)
            }
        }
    }

    async fn write_version(
        &self,
        row: &DocumentVersion,
        content: &str,
        method: ChunkMethod,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Ingested> {
        let card_id = row.card_id;
        self.objects
            .put(
                &self.buckets.markdown,
                &markdown_key(card_id, row.version),
                content.as_bytes().to_vec(),
                MARKDOWN_CONTENT_TYPE,
            )
            .await?;

        let chunks = chunk(content, method);
        let stored = embed_and_store(self.store, embedder, card_id, row.version, &chunks).await?;
        info!(
            card = %card_id,
            version = row.version,
            method = %method,
            chunks = chunks.len(),
            stored,
            "ingested version"
        );

        Ok(Ingested {
            version: row.version,
            chunks_total: chunks.len(),
            chunks_stored: stored,
        })
    }

    /// Best-effort removal of a half-written version.
    async fn discard_version(&self, card_id: CardId, version: i64) {
        let key = markdown_key(card_id, version);
        if let Err(e) = self.objects.delete(&self.buckets.markdown, &key).await {
            warn!(card = %card_id, key = %key, error = %e, "failed to delete markdown blob");
        }
        if let Err(e) = self.store.delete_version(card_id, version).await {
            warn!(card = %card_id, version, error = %e, "failed to delete version row");
        }
    }

    /// The card's most recent image association.
    pub async fn image(&self, card_id: CardId) -> Result<Image> {
        self.store
            .card_image(card_id)
            .await?
            .ok_or_else(|| Error::not_found("image", card_id))
    }

    pub fn image_url(&self, image: &Image) -> String {
        self.objects.object_url(&self.buckets.images, &image.filename)
    }

    /// Markdown of a specific version.
    pub async fn markdown(&self, card_id: CardId, version: i64) -> Result<MarkdownSnapshot> {
        let known = self
            .store
            .versions(card_id)
            .await?
            .iter()
            .any(|v| v.version == version);
        if !known {
            return Err(Error::not_found(
                "version",
                format!("{} of card {}", version, card_id),
            ));
        }
        self.fetch_markdown(card_id, version).await
    }

    /// Markdown of the latest version.
    pub async fn latest_markdown(&self, card_id: CardId) -> Result<MarkdownSnapshot> {
        let latest = self
            .store
            .latest_version(card_id)
            .await?
            .ok_or_else(|| Error::not_found("markdown", card_id))?;
        self.fetch_markdown(card_id, latest.version).await
    }

    async fn fetch_markdown(&self, card_id: CardId, version: i64) -> Result<MarkdownSnapshot> {
        let bytes = self
            .objects
            .get(&self.buckets.markdown, &markdown_key(card_id, version))
            .await?;
        let content = String::from_utf8(bytes).map_err(|e| {
            Error::storage("read markdown", format!("card {} v{}: {}", card_id, version, e))
        })?;
        Ok(MarkdownSnapshot {
            card_id,
            version,
            content,
        })
    }

    /// Record an edit of previously downloaded markdown.
    ///
    /// `downloaded` is what the editor started from. If `edited` hashes the
    /// same, nothing is written. Otherwise the new version number is the
    /// current latest + 1; a concurrent edit that already took that number
    /// surfaces as `StorageConstraint`.
    pub async fn apply_edit(
        &self,
        card_id: CardId,
        downloaded: &MarkdownSnapshot,
        edited: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<EditOutcome> {
        let old_hash = content_hash(downloaded.content.as_bytes());
        let decision = should_create_new_version(&old_hash, edited.as_bytes());
        if !decision.changed {
            info!(card = %card_id, version = downloaded.version, "content unchanged, no new version");
            return Ok(EditOutcome::Unchanged {
                version: downloaded.version,
            });
        }

        let latest = self.store.latest_version(card_id).await?.map(|v| v.version);
        let version = next_version(latest);
        let method = self.chunk_method_for(card_id).await?;

        let ingested = self
            .ingest(card_id, version, edited, method, embedder)
            .await?;
        Ok(EditOutcome::Created {
            version: ingested.version,
            chunks_stored: ingested.chunks_stored,
        })
    }

    /// Download the latest markdown and apply `edited` against it.
    pub async fn edit(
        &self,
        card_id: CardId,
        edited: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<EditOutcome> {
        let current = self.latest_markdown(card_id).await?;
        self.apply_edit(card_id, &current, edited, embedder).await
    }

    /// Cards without an image row (created outside the upload flow) are
    /// treated as markdown.
    async fn chunk_method_for(&self, card_id: CardId) -> Result<ChunkMethod> {
        Ok(self
            .store
            .card_image(card_id)
            .await?
            .map(|img| img.method.chunk_method())
            .unwrap_or(ChunkMethod::Structural))
    }

    /// Delete a card, its blobs, and every dependent row.
    pub async fn delete(&self, card_id: CardId) -> Result<DeleteReport> {
        if !self.store.card_exists(card_id).await? {
            return Err(Error::not_found("card", card_id));
        }

        let mut blobs: Vec<(&str, String)> = Vec::new();
        if let Some(img) = self.store.card_image(card_id).await? {
            blobs.push((self.buckets.images.as_str(), img.filename));
        }
        for v in self.store.versions(card_id).await? {
            blobs.push((self.buckets.markdown.as_str(), markdown_key(card_id, v.version)));
        }

        let mut report = DeleteReport::default();
        for (bucket, key) in &blobs {
            match self.objects.delete(bucket, key).await {
                Ok(()) => report.blobs_deleted += 1,
                Err(e) => {
                    warn!(card = %card_id, bucket = %bucket, key = %key, error = %e, "failed to delete blob");
                    report.blob_failures += 1;
                }
            }
        }

        self.store.delete_card(card_id).await?;
        info!(
            card = %card_id,
            blobs = report.blobs_deleted,
            failures = report.blob_failures,
            "deleted card"
        );
        Ok(report)
    }
}
