//! In-memory [`Store`] implementation for tests and embedders of the
//! library.
//!
//! Rows live in `BTreeMap`s behind one `RwLock`, so iteration follows key
//! order and matches the scan order a relational backend would produce.
//! Vector search is brute-force cosine distance over stored vectors.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{
    CardId, ChunkEmbedding, ChunkHit, DocumentVersion, Image, NewImage, StoreStats,
};

use super::{rank_candidates, Store};

type ChunkKey = (CardId, i64, String, i64);

#[derive(Default)]
struct Tables {
    next_card: i64,
    cards: BTreeMap<CardId, i64>,
    images: Vec<Image>,
    versions: BTreeMap<(CardId, i64), DocumentVersion>,
    chunks: BTreeMap<ChunkKey, ChunkEmbedding>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| Error::storage("memory store read", e))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| Error::storage("memory store write", e))
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_card(&self) -> Result<CardId> {
        let mut t = self.write()?;
        t.next_card += 1;
        let id = CardId(t.next_card);
        t.cards.insert(id, now());
        Ok(id)
    }

    async fn card_exists(&self, card_id: CardId) -> Result<bool> {
        Ok(self.read()?.cards.contains_key(&card_id))
    }

    async fn delete_card(&self, card_id: CardId) -> Result<()> {
        let mut t = self.write()?;
        if t.cards.remove(&card_id).is_none() {
            return Err(Error::not_found("card", card_id));
        }
        t.images.retain(|i| i.card_id != card_id);
        t.versions.retain(|(c, _), _| *c != card_id);
        t.chunks.retain(|(c, _, _, _), _| *c != card_id);
        Ok(())
    }

    async fn insert_image(&self, image: &NewImage) -> Result<Image> {
        let mut t = self.write()?;
        if !t.cards.contains_key(&image.card_id) {
            return Err(Error::constraint(
                "insert image",
                format!("card {} does not exist", image.card_id),
            ));
        }
        let row = Image {
            card_id: image.card_id,
            filename: image.filename.clone(),
            method: image.method,
            created_at: now(),
        };
        t.images.push(row.clone());
        Ok(row)
    }

    async fn card_image(&self, card_id: CardId) -> Result<Option<Image>> {
        let t = self.read()?;
        Ok(t.images.iter().rev().find(|i| i.card_id == card_id).cloned())
    }

    async fn insert_version(
        &self,
        card_id: CardId,
        version: i64,
        content_hash: &str,
    ) -> Result<DocumentVersion> {
        let mut t = self.write()?;
        if !t.cards.contains_key(&card_id) {
            return Err(Error::constraint(
                "insert version",
                format!("card {} does not exist", card_id),
            ));
        }
        if version < 1 {
            return Err(Error::constraint(
                "insert version",
                format!("version must be >= 1, got {}", version),
            ));
        }
        if t.versions.contains_key(&(card_id, version)) {
            return Err(Error::constraint(
                "insert version",
                format!("card {} already has version {}", card_id, version),
            ));
        }
        let row = DocumentVersion {
            card_id,
            version,
            content_hash: content_hash.to_string(),
            created_at: now(),
        };
        t.versions.insert((card_id, version), row.clone());
        Ok(row)
    }

    async fn delete_version(&self, card_id: CardId, version: i64) -> Result<()> {
        let mut t = self.write()?;
        if t.versions.remove(&(card_id, version)).is_none() {
            return Err(Error::not_found(
                "version",
                format!("{} of card {}", version, card_id),
            ));
        }
        t.chunks
            .retain(|(c, v, _, _), _| !(*c == card_id && *v == version));
        Ok(())
    }

    async fn latest_version(&self, card_id: CardId) -> Result<Option<DocumentVersion>> {
        let t = self.read()?;
        Ok(t
            .versions
            .range((card_id, i64::MIN)..=(card_id, i64::MAX))
            .next_back()
            .map(|(_, v)| v.clone()))
    }

    async fn versions(&self, card_id: CardId) -> Result<Vec<DocumentVersion>> {
        let t = self.read()?;
        Ok(t.versions
            .range((card_id, i64::MIN)..=(card_id, i64::MAX))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn insert_chunk(&self, chunk: &ChunkEmbedding) -> Result<()> {
        let mut t = self.write()?;
        if !t.versions.contains_key(&(chunk.card_id, chunk.version)) {
            return Err(Error::constraint(
                "insert chunk",
                format!(
                    "card {} has no version {}",
                    chunk.card_id, chunk.version
                ),
            ));
        }
        let key = (
            chunk.card_id,
            chunk.version,
            chunk.model.clone(),
            chunk.chunk_index,
        );
        if t.chunks.contains_key(&key) {
            return Err(Error::constraint(
                "insert chunk",
                format!(
                    "chunk {} of card {} version {} already embedded with {}",
                    chunk.chunk_index, chunk.card_id, chunk.version, chunk.model
                ),
            ));
        }
        t.chunks.insert(key, chunk.clone());
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let t = self.read()?;
        Ok(StoreStats {
            cards: t.cards.len() as i64,
            images: t.images.len() as i64,
            versions: t.versions.len() as i64,
            chunks: t.chunks.len() as i64,
        })
    }

    async fn nearest_latest_chunks(
        &self,
        query: &[f32],
        model: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChunkHit>> {
        let t = self.read()?;

        let mut latest: BTreeMap<CardId, i64> = BTreeMap::new();
        for (card_id, version) in t.versions.keys() {
            let entry = latest.entry(*card_id).or_insert(*version);
            *entry = (*entry).max(*version);
        }

        // Key order is (card, version, model, index); re-sort to scan order
        // (card, version, index) once the model filter is applied.
        let mut candidates: Vec<ChunkEmbedding> = t
            .chunks
            .values()
            .filter(|c| c.model == model && latest.get(&c.card_id) == Some(&c.version))
            .cloned()
            .collect();
        candidates.sort_by_key(|c| (c.card_id, c.version, c.chunk_index));

        Ok(rank_candidates(query, candidates, limit))
    }
}
