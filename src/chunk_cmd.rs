//! `ume chunk`: preview how a markdown or text file would be chunked.
//! Runs offline; no database, blobs, or providers are touched.

use std::path::Path;

use anyhow::{Context, Result};

use umesao_core::chunk::{chunk, ChunkMethod};

pub fn run_chunk(path: &Path, method: Option<&str>) -> Result<()> {
    let method = match method {
        Some(m) => m.parse::<ChunkMethod>()?,
        None => ChunkMethod::Structural,
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let chunks = chunk(&content, method);
    println!("{} chunks ({} chunking)", chunks.len(), method);
    for (i, c) in chunks.iter().enumerate() {
        println!();
        println!("[{}] {} chars", i, c.chars().count());
        println!("{}", c.trim_end());
    }
    Ok(())
}
