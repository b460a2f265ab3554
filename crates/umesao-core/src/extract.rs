//! Text extraction provider trait.
//!
//! An extractor turns the bytes of a card photo into text. OCR-family
//! extractors return markdown; vision captioners return plain prose. The
//! [`ExtractionMethod`] an extractor reports decides how the text is
//! chunked, now and on every later edit of the card.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ExtractionMethod;

/// A card photo as read from disk.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Base name of the source file, e.g. `IMG_0042.jpg`.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    async fn extract(&self, image: &ImageUpload) -> Result<String>;
}
