//! `ume upload` and `ume dry-run`: photograph in, searchable card out.

use std::path::Path;

use anyhow::{Context, Result};

use umesao_core::chunk::chunk;
use umesao_core::extract::ImageUpload;
use umesao_core::models::ExtractionMethod;
use umesao_core::object_store::image_content_type;

use crate::app::App;
use crate::config::{Config, Secrets};
use crate::extraction::create_extractor;

/// Read an image file into an upload.
pub fn read_image(path: &Path) -> Result<ImageUpload> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Image path has no file name: {}", path.display()))?;
    Ok(ImageUpload {
        content_type: image_content_type(&file_name).to_string(),
        file_name,
        bytes,
    })
}

fn resolve_method(config: &Config, method: Option<&str>) -> Result<ExtractionMethod> {
    match method {
        Some(m) => Ok(m.parse()?),
        None => config.extraction.method(),
    }
}

pub async fn run_upload(
    config: &Config,
    path: &Path,
    method: Option<&str>,
    language: Option<&str>,
) -> Result<()> {
    let method = resolve_method(config, method)?;
    let image = read_image(path)?;

    let app = App::open(config).await?;
    let extractor = app.extractor(method, language)?;
    let embedder = app.embedder()?;

    let report = app
        .manager()
        .upload(&image, extractor.as_ref(), embedder.as_ref())
        .await
        .with_context(|| format!("Upload of {} failed", path.display()))?;

    println!("Uploaded card {}", report.card_id);
    println!("  image:    {}", report.image_key);
    println!("  method:   {}", method);
    println!("  version:  {}", report.version);
    println!(
        "  chunks:   {} stored / {} total",
        report.chunks_stored, report.chunks_total
    );
    println!();
    println!("{}", report.markdown.trim_end());

    app.store.pool().close().await;
    Ok(())
}

/// Extract and chunk without touching the database or blob storage.
pub async fn run_dry_run(config: &Config, path: &Path, method: Option<&str>) -> Result<()> {
    let method = resolve_method(config, method)?;
    let image = read_image(path)?;
    let extractor = create_extractor(method, &config.extraction, &Secrets::from_env(), None)?;

    let text = extractor
        .extract(&image)
        .await
        .with_context(|| format!("Extraction of {} failed", path.display()))?;
    let chunks = chunk(&text, method.chunk_method());

    println!("Dry run: {} ({})", image.file_name, method);
    println!();
    println!("{}", text.trim_end());
    println!();
    println!("{} chunks ({} chunking):", chunks.len(), method.chunk_method());
    for (i, c) in chunks.iter().enumerate() {
        println!("  [{}] {}", i, c.replace('\n', " ").trim());
    }
    Ok(())
}
