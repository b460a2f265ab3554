//! # Umesao
//!
//! Photograph handwritten or printed note cards, turn them into markdown,
//! and look them up again by meaning.
//!
//! The pipeline logic (chunking, versioning, ranking, card lifecycle) lives
//! in [`umesao_core`]. This crate supplies the concrete backends and the
//! `ume` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐   ┌─────────────┐
//! │  photo   │──▶│  extraction  │──▶│ markdown │──▶│ chunk+embed │
//! └──────────┘   │ OCR / vision │   │ (blob)   │   └──────┬──────┘
//!                └──────────────┘   └──────────┘          ▼
//!                                                  ┌─────────────┐
//!                         ume lookup ◀─────────────│   SQLite    │
//!                                                  └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`db`], [`migrate`] | SQLite connection and schema |
//! | [`sqlite_store`] | Relational and vector storage |
//! | [`object_store_fs`], [`object_store_s3`] | Image and markdown blobs |
//! | [`embedding`] | OpenAI, Ollama, and local embedding providers |
//! | [`extraction`] | Azure Read, Mistral OCR, and vision captioning |
//! | [`openai`] | Chat completions for markdown, translation, captions |
//! | [`app`] | Backend wiring for CLI commands |

pub mod app;
pub mod chunk_cmd;
pub mod config;
pub mod db;
pub mod delete;
pub mod edit;
pub mod embedding;
pub mod extraction;
pub mod http;
pub mod lookup;
pub mod migrate;
pub mod object_store_fs;
pub mod object_store_s3;
pub mod openai;
pub mod show;
pub mod sqlite_store;
pub mod stats;
pub mod upload;
