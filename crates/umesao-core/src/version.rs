//! Content-addressed versioning of card markdown.
//!
//! A card's markdown gets a new version only when its SHA-256 fingerprint
//! changes. Byte equality of the hash is the only change signal; there is
//! no semantic diffing, so a whitespace edit is a real edit.

use sha2::{Digest, Sha256};

/// Version number of a card's first markdown snapshot.
pub const FIRST_VERSION: i64 = 1;

/// Result of comparing new content against a previous fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDecision {
    /// Fingerprint of the new content.
    pub hash: String,
    /// `true` when the new content differs from the old.
    pub changed: bool,
}

/// Lower-case hex SHA-256 of `content` (64 characters).
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Decide whether `new_content` warrants a new version relative to a
/// previous fingerprint.
pub fn should_create_new_version(old_hash: &str, new_content: &[u8]) -> VersionDecision {
    let hash = content_hash(new_content);
    let changed = !hash.eq_ignore_ascii_case(old_hash);
    VersionDecision { hash, changed }
}

/// Version number to assign after `latest`. `None` means the card has no
/// markdown yet.
pub fn next_version(latest: Option<i64>) -> i64 {
    match latest {
        Some(v) => v + 1,
        None => FIRST_VERSION,
    }
}
