//! Embedding store adapter: chunks in, chunk rows out.
//!
//! Persists one `(card, version, chunk_index, model, text, vector)` row per
//! non-blank chunk. Blank chunks are skipped silently but keep their slot in
//! the index sequence, so `chunk_index` always equals the chunk's position
//! in the chunker output.
//!
//! The version row must exist before any chunk row is written; the store
//! rejects orphans and duplicate keys with `StorageConstraint`. Regenerating
//! embeddings for an existing version is not supported; changed content must
//! go through the versioner first.

use tracing::debug;

use crate::embedding::{embed_in_order, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::{CardId, ChunkEmbedding};
use crate::store::Store;

/// Persist `chunks` with their positionally aligned `vectors`.
///
/// Returns the number of rows written.
pub async fn store_chunks(
    store: &dyn Store,
    card_id: CardId,
    version: i64,
    chunks: &[String],
    vectors: &[Vec<f32>],
    model: &str,
) -> Result<usize> {
    if chunks.len() != vectors.len() {
        return Err(Error::InvalidInput(format!(
            "{} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }

    let mut written = 0;
    for (index, (text, vector)) in chunks.iter().zip(vectors).enumerate() {
        if text.trim().is_empty() {
            debug!(card = %card_id, version, index, "skipping blank chunk");
            continue;
        }
        store
            .insert_chunk(&ChunkEmbedding {
                card_id,
                version,
                chunk_index: index as i64,
                model: model.to_string(),
                text: text.clone(),
                embedding: vector.clone(),
            })
            .await?;
        written += 1;
    }
    Ok(written)
}

/// Embed the non-blank `chunks` with `provider` and persist them.
///
/// Blank chunks are never sent to the provider.
pub async fn embed_and_store(
    store: &dyn Store,
    provider: &dyn EmbeddingProvider,
    card_id: CardId,
    version: i64,
    chunks: &[String],
) -> Result<usize> {
    let positions: Vec<usize> = chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.trim().is_empty())
        .map(|(i, _)| i)
        .collect();
    let texts: Vec<String> = positions.iter().map(|&i| chunks[i].clone()).collect();

    let embedded = embed_in_order(provider, &texts).await?;

    let mut vectors = vec![Vec::new(); chunks.len()];
    for (pos, vector) in positions.into_iter().zip(embedded) {
        vectors[pos] = vector;
    }

    store_chunks(
        store,
        card_id,
        version,
        chunks,
        &vectors,
        provider.model_name(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::IndexedEmbedding;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every batch it is asked to embed.
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmbeddingProvider for Recording {
        fn model_name(&self) -> &str {
            "rec"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
            self.seen.lock().unwrap().extend(texts.iter().cloned());
            Ok(texts
                .iter()
                .enumerate()
                .map(|(index, t)| IndexedEmbedding {
                    index,
                    vector: vec![t.len() as f32],
                })
                .collect())
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_blank_chunks_skipped_and_indices_kept() {
        let store = InMemoryStore::new();
        let card = store.create_card().await.unwrap();
        store.insert_version(card, 1, "h").await.unwrap();
        let provider = Recording {
            seen: Mutex::new(Vec::new()),
        };

        let chunks = strings(&["whole", "  ", "second"]);
        let n = embed_and_store(&store, &provider, card, 1, &chunks)
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(*provider.seen.lock().unwrap(), strings(&["whole", "second"]));

        let hits = store.nearest_latest_chunks(&[1.0], "rec", None).await.unwrap();
        let mut indices: Vec<i64> = hits.iter().map(|h| h.chunk_index).collect();
        indices.sort();
        assert_eq!(indices, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_missing_version_row_fails() {
        let store = InMemoryStore::new();
        let card = store.create_card().await.unwrap();
        let err = store_chunks(&store, card, 1, &strings(&["a"]), &[vec![1.0]], "m")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageConstraint { .. }));
    }

    #[tokio::test]
    async fn test_rerun_for_same_version_fails() {
        let store = InMemoryStore::new();
        let card = store.create_card().await.unwrap();
        store.insert_version(card, 1, "h").await.unwrap();
        let chunks = strings(&["a"]);
        store_chunks(&store, card, 1, &chunks, &[vec![1.0]], "m")
            .await
            .unwrap();
        let err = store_chunks(&store, card, 1, &chunks, &[vec![1.0]], "m")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageConstraint { .. }));
    }

    #[tokio::test]
    async fn test_length_mismatch_is_invalid() {
        let store = InMemoryStore::new();
        let err = store_chunks(&store, CardId(1), 1, &strings(&["a", "b"]), &[vec![1.0]], "m")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
