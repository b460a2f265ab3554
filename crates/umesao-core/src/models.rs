//! Core data models for cards and their derived content.
//!
//! A [`CardId`] identifies one physical note. Everything else (image
//! associations, markdown versions, chunk embeddings) hangs off a card and
//! disappears with it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkMethod;
use crate::error::Error;

/// Opaque card identifier, assigned by the store at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub i64);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(CardId)
            .map_err(|e| Error::InvalidInput(format!("invalid card id '{}': {}", s, e)))
    }
}

/// How the text of a card image was extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Azure Read OCR followed by markdown reconstruction.
    Ocr,
    /// Mistral OCR followed by markdown reconstruction.
    Mistral,
    /// Vision-language captioning; yields plain prose, not markdown.
    Vision,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Mistral => "mistral",
            ExtractionMethod::Vision => "vision",
        }
    }

    /// Chunking strategy matching the kind of text this method produces.
    pub fn chunk_method(&self) -> ChunkMethod {
        match self {
            ExtractionMethod::Ocr | ExtractionMethod::Mistral => ChunkMethod::Structural,
            ExtractionMethod::Vision => ChunkMethod::Flat,
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ocr" => Ok(ExtractionMethod::Ocr),
            "mistral" => Ok(ExtractionMethod::Mistral),
            "vision" => Ok(ExtractionMethod::Vision),
            other => Err(Error::InvalidInput(format!(
                "unknown extraction method '{}': expected ocr, mistral, or vision",
                other
            ))),
        }
    }
}

/// A stored card row.
#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub id: CardId,
    /// Unix seconds.
    pub created_at: i64,
}

/// Image association to be inserted.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub card_id: CardId,
    /// Object key in the image bucket.
    pub filename: String,
    pub method: ExtractionMethod,
}

/// A stored image association.
#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub card_id: CardId,
    pub filename: String,
    pub method: ExtractionMethod,
    pub created_at: i64,
}

/// One immutable snapshot of a card's markdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentVersion {
    pub card_id: CardId,
    /// Starts at 1, strictly increasing per card.
    pub version: i64,
    /// Lower-case hex SHA-256 of the markdown bytes.
    pub content_hash: String,
    pub created_at: i64,
}

/// A chunk's text and embedding, keyed by
/// `(card_id, version, model, chunk_index)`.
#[derive(Debug, Clone)]
pub struct ChunkEmbedding {
    pub card_id: CardId,
    pub version: i64,
    /// 0 holds the whole document.
    pub chunk_index: i64,
    pub model: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A raw nearest-neighbour hit from the store, before per-card collapsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkHit {
    pub card_id: CardId,
    pub version: i64,
    pub chunk_index: i64,
    pub model: String,
    pub text: String,
    /// Cosine distance: 0 = same direction, 2 = opposite.
    pub distance: f64,
}

/// One ranked card, represented by its closest chunk.
pub type SearchResult = ChunkHit;

/// Row counts across the relational store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub cards: i64,
    pub images: i64,
    pub versions: i64,
    pub chunks: i64,
}

/// Object key of a card's markdown blob for one version.
pub fn markdown_key(card_id: CardId, version: i64) -> String {
    format!("{}_{}.md", card_id, version)
}

/// Object key of a card's image blob.
///
/// The card id prefix keeps identically named photos of different cards
/// from overwriting each other.
pub fn image_key(card_id: CardId, file_name: &str) -> String {
    format!("{}_{}", card_id, file_name)
}
