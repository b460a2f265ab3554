//! Error type shared by every core component.
//!
//! Each variant is one failure kind the pipeline distinguishes. Adapters in
//! the application crate (SQLite, S3, HTTP providers) translate their own
//! errors into these variants so callers can match on the kind rather than
//! on message text.
//!
//! An edit that leaves the content unchanged is *not* an error; it is
//! reported as [`EditOutcome::Unchanged`](crate::lifecycle::EditOutcome).

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A required credential, endpoint, or setting is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A card, version, image, or blob does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// An external provider (OCR, embedding, translation, object store)
    /// answered with a non-2xx status or a malformed payload.
    #[error("{service} failed: {message}")]
    ExternalService { service: String, message: String },

    /// A bounded polling loop ran out of attempts.
    #[error("{operation} gave up after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    /// A uniqueness or foreign-key constraint rejected a write.
    #[error("constraint violated during {operation}: {message}")]
    StorageConstraint { operation: String, message: String },

    /// Search found no candidate chunk among the latest versions.
    #[error("no searchable chunks are stored yet; upload a card before searching")]
    EmptyCorpus,

    /// Any other storage backend failure.
    #[error("storage error during {operation}: {message}")]
    Storage { operation: String, message: String },

    /// Caller passed arguments that can never succeed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn external(service: impl Into<String>, message: impl ToString) -> Self {
        Error::ExternalService {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn constraint(operation: impl Into<String>, message: impl ToString) -> Self {
        Error::StorageConstraint {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn storage(operation: impl Into<String>, message: impl ToString) -> Self {
        Error::Storage {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
