//! Relational storage abstraction for card metadata and embeddings.
//!
//! The [`Store`] trait is the set of query contracts the pipeline relies
//! on. Implementations must enforce the same constraints a relational
//! schema would: unique keys, foreign keys, and cascade delete on cards.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`create_card`](Store::create_card) | Allocate a new card id |
//! | [`delete_card`](Store::delete_card) | Remove a card and every dependent row |
//! | [`insert_image`](Store::insert_image) | Associate an image blob with a card |
//! | [`insert_version`](Store::insert_version) | Record a markdown snapshot |
//! | [`delete_version`](Store::delete_version) | Drop one version and its chunks |
//! | [`insert_chunk`](Store::insert_chunk) | Persist one chunk embedding |
//! | [`nearest_latest_chunks`](Store::nearest_latest_chunks) | Latest-version-only cosine search |

pub mod memory;

use async_trait::async_trait;
use tracing::warn;

use crate::embedding::cosine_distance;
use crate::error::Result;
use crate::models::{
    CardId, ChunkEmbedding, ChunkHit, DocumentVersion, Image, NewImage, StoreStats,
};

#[async_trait]
pub trait Store: Send + Sync {
    /// Allocate a new, never reused card id.
    async fn create_card(&self) -> Result<CardId>;

    async fn card_exists(&self, card_id: CardId) -> Result<bool>;

    /// Delete a card with its images, versions, and chunks.
    ///
    /// Fails with `NotFound` when the card does not exist.
    async fn delete_card(&self, card_id: CardId) -> Result<()>;

    /// Fails with `StorageConstraint` when the card does not exist.
    async fn insert_image(&self, image: &NewImage) -> Result<Image>;

    /// Most recently inserted image of a card.
    async fn card_image(&self, card_id: CardId) -> Result<Option<Image>>;

    /// Record a new version row.
    ///
    /// Fails with `StorageConstraint` when the card does not exist, when
    /// `version < 1`, or when `(card_id, version)` already exists. The last
    /// case is what two racing edits of one card run into.
    async fn insert_version(
        &self,
        card_id: CardId,
        version: i64,
        content_hash: &str,
    ) -> Result<DocumentVersion>;

    /// Remove one version row together with its chunks.
    ///
    /// Fails with `NotFound` when `(card_id, version)` does not exist.
    async fn delete_version(&self, card_id: CardId, version: i64) -> Result<()>;

    async fn latest_version(&self, card_id: CardId) -> Result<Option<DocumentVersion>>;

    /// All versions of a card, ascending.
    async fn versions(&self, card_id: CardId) -> Result<Vec<DocumentVersion>>;

    /// Fails with `StorageConstraint` when `(card_id, version)` has no
    /// version row or the `(card_id, version, model, chunk_index)` key is
    /// already taken.
    async fn insert_chunk(&self, chunk: &ChunkEmbedding) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;

    /// Cosine-nearest chunks among each card's latest version, restricted to
    /// vectors produced by `model`.
    ///
    /// Hits are ascending by distance; ties keep scan order
    /// `(card_id, version, chunk_index)`. Cards without any version never
    /// appear, nor do vectors whose length differs from `query`. `limit`
    /// truncates after sorting.
    async fn nearest_latest_chunks(
        &self,
        query: &[f32],
        model: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChunkHit>>;
}

/// Score candidates against `query` and order them for
/// [`Store::nearest_latest_chunks`].
///
/// Candidates must already be filtered to latest versions and arrive in
/// scan order; the sort is stable so equal distances keep that order.
/// Vectors of a different length than `query` are skipped with a warning.
pub fn rank_candidates<I>(query: &[f32], candidates: I, limit: Option<usize>) -> Vec<ChunkHit>
where
    I: IntoIterator<Item = ChunkEmbedding>,
{
    let mut mismatched = 0usize;
    let mut hits: Vec<ChunkHit> = candidates
        .into_iter()
        .filter(|c| {
            let fits = c.embedding.len() == query.len();
            if !fits {
                mismatched += 1;
            }
            fits
        })
        .map(|c| ChunkHit {
            distance: cosine_distance(query, &c.embedding),
            card_id: c.card_id,
            version: c.version,
            chunk_index: c.chunk_index,
            model: c.model,
            text: c.text,
        })
        .collect();
    if mismatched > 0 {
        warn!(
            skipped = mismatched,
            dims = query.len(),
            "skipped stored vectors with different dimensions"
        );
    }

    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    if let Some(limit) = limit {
        hits.truncate(limit);
    }
    hits
}
