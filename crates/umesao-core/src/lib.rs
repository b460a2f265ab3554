//! # Umesao Core
//!
//! Storage-agnostic logic for the umesao card pipeline: data models,
//! chunking, content versioning, the embedding store adapter, the
//! latest-version retrieval ranker, and card lifecycle orchestration.
//!
//! This crate has no database, HTTP, or filesystem dependencies. Backends
//! plug in through the [`store::Store`], [`object_store::ObjectStore`],
//! [`embedding::EmbeddingProvider`], and [`extract::TextExtractor`]
//! traits; in-memory implementations of the two stores ship here for
//! tests.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod lifecycle;
pub mod models;
pub mod object_store;
pub mod search;
pub mod store;
pub mod version;

pub use error::{Error, Result};
