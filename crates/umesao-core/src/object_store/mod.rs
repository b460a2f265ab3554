//! Blob storage abstraction for card images and markdown snapshots.
//!
//! Images and markdown live in separate buckets. Keys follow the
//! conventions in [`crate::models`]: `{card}_{file name}` for images and
//! `{card}_{version}.md` for markdown.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `bucket/key`, replacing any existing object.
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<()>;

    /// Fetch an object. Fails with `NotFound` when it does not exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Remove an object. Removing a missing object is not an error.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Human-facing location of an object (URL or path).
    fn object_url(&self, bucket: &str, key: &str) -> String;
}

/// Bucket names for the two blob kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    pub images: String,
    pub markdown: String,
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            images: "card-images".to_string(),
            markdown: "card-markdown".to_string(),
        }
    }
}

/// Guess a content type from an image file name.
pub fn image_content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type("IMG_1.JPG"), "image/jpeg");
        assert_eq!(image_content_type("scan.png"), "image/png");
        assert_eq!(image_content_type("noext"), "application/octet-stream");
    }
}
