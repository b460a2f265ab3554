//! Retrieval ranker: latest-version-only nearest-neighbour search with one
//! result per card.
//!
//! The ranker operates entirely through the [`Store`] trait. The store
//! returns raw chunk hits ascending by cosine distance, already restricted
//! to the latest version of each card; this module collapses them into
//! unique cards.
//!
//! # Ranking policies
//!
//! | Policy | Steps |
//! |--------|-------|
//! | [`RankingPolicy::ChunkFirst`] (default) | take the global top-K chunk hits, then keep the first hit per card |
//! | [`RankingPolicy::CardBest`] | keep every card's closest hit, then take the top K cards |
//!
//! With `ChunkFirst` a card can drop out entirely when none of its chunks
//! reach the global top K, and fewer than K cards may come back.
//! `CardBest` always returns `min(K, cards)` results.
//!
//! Each result keeps the distance of the chunk that represents its card.
//! Equal distances keep the store's scan order.
//!
//! A search with no candidate chunks at all (nothing stored, latest
//! versions without chunks, or only other models' vectors) fails with
//! [`Error::EmptyCorpus`], so a successful search always returns at least
//! one card.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedding::{embed_in_order, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::{ChunkHit, SearchResult};
use crate::store::Store;

/// Default number of raw hits (or cards) considered.
pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankingPolicy {
    /// Cut to top-K chunks, then deduplicate by card.
    #[default]
    ChunkFirst,
    /// Best chunk per card first, then cut to top-K cards.
    CardBest,
}

impl fmt::Display for RankingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingPolicy::ChunkFirst => f.write_str("chunk-first"),
            RankingPolicy::CardBest => f.write_str("card-best"),
        }
    }
}

impl FromStr for RankingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chunk-first" => Ok(RankingPolicy::ChunkFirst),
            "card-best" => Ok(RankingPolicy::CardBest),
            other => Err(Error::InvalidInput(format!(
                "unknown ranking policy '{}': expected chunk-first or card-best",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub top_k: usize,
    pub policy: RankingPolicy,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            policy: RankingPolicy::default(),
        }
    }
}

/// Keep the first hit of each card, preserving order.
///
/// Given hits already sorted by distance, this keeps each card's closest
/// chunk.
pub fn dedup_by_card(hits: Vec<ChunkHit>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|h| seen.insert(h.card_id))
        .collect()
}

/// Fail with [`Error::EmptyCorpus`] when no chunk is stored at all.
///
/// A cheap pre-check for [`lookup`]; [`rank`] decides from the actual
/// candidates.
pub async fn require_corpus(store: &dyn Store) -> Result<()> {
    if store.stats().await?.chunks == 0 {
        return Err(Error::EmptyCorpus);
    }
    Ok(())
}

/// Rank cards by a precomputed query vector.
///
/// Only chunks embedded with `model` are compared. No candidates at all is
/// [`Error::EmptyCorpus`].
pub async fn rank(
    store: &dyn Store,
    query_vec: &[f32],
    model: &str,
    params: &SearchParams,
) -> Result<Vec<SearchResult>> {
    if params.top_k == 0 {
        return Err(Error::InvalidInput("top_k must be at least 1".into()));
    }

    let limit = match params.policy {
        RankingPolicy::ChunkFirst => Some(params.top_k),
        RankingPolicy::CardBest => None,
    };
    let hits = store.nearest_latest_chunks(query_vec, model, limit).await?;
    debug!(policy = %params.policy, hits = hits.len(), "ranking candidates");
    if hits.is_empty() {
        return Err(Error::EmptyCorpus);
    }

    let mut cards = dedup_by_card(hits);
    cards.truncate(params.top_k);
    Ok(cards)
}

/// Embed `query` with `provider` and rank cards against it.
///
/// The corpus check runs before the provider is called, so an empty store
/// fails fast without a network round-trip.
pub async fn lookup(
    store: &dyn Store,
    provider: &dyn EmbeddingProvider,
    query: &str,
    params: &SearchParams,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() {
        return Err(Error::InvalidInput("query is empty".into()));
    }
    require_corpus(store).await?;

    let mut vectors = embed_in_order(provider, &[query.to_string()]).await?;
    let query_vec = vectors
        .pop()
        .ok_or_else(|| Error::external("embedding", "no vector returned for query"))?;

    rank(store, &query_vec, provider.model_name(), params).await
}
