//! `ume show` and `ume download`: read a card back.

use std::path::Path;

use anyhow::{Context, Result};

use umesao_core::lifecycle::{CardManager, MarkdownSnapshot};
use umesao_core::models::CardId;
use umesao_core::store::Store;

use crate::app::App;
use crate::config::Config;
use crate::openai::ChatClient;

async fn snapshot(
    manager: &CardManager<'_>,
    card: CardId,
    version: Option<i64>,
) -> Result<MarkdownSnapshot> {
    let snap = match version {
        Some(v) => manager.markdown(card, v).await,
        None => manager.latest_markdown(card).await,
    };
    snap.with_context(|| format!("Failed to load markdown of card {}", card))
}

/// Print a card's markdown and image location, optionally translated.
pub async fn run_show(
    config: &Config,
    card: CardId,
    version: Option<i64>,
    lang: Option<&str>,
) -> Result<()> {
    let app = App::open(config).await?;
    let manager = app.manager();
    let snap = snapshot(&manager, card, version).await?;

    let versions = app.store.versions(card).await?.len();
    println!("Card {} (version {} of {})", card, snap.version, versions);
    match manager.image(card).await {
        Ok(image) => {
            println!("  image:  {}", manager.image_url(&image));
            println!("  method: {}", image.method);
        }
        Err(e) if e.is_not_found() => println!("  image:  (none)"),
        Err(e) => return Err(e.into()),
    }
    println!();

    let body = match lang {
        Some(lang) => {
            let chat = ChatClient::new(&app.secrets, config.translation.timeout_secs)?;
            chat.translate(&config.translation.model, &snap.content, lang)
                .await
                .with_context(|| format!("Translation to {} failed", lang))?
        }
        None => snap.content,
    };
    println!("{}", body.trim_end());

    app.store.pool().close().await;
    Ok(())
}

/// Write a card's markdown to `output`, or to `{card}_{version}.md` in the
/// current directory.
pub async fn run_download(
    config: &Config,
    card: CardId,
    version: Option<i64>,
    output: Option<&Path>,
) -> Result<()> {
    let app = App::open(config).await?;
    let snap = snapshot(&app.manager(), card, version).await?;

    let default_name = umesao_core::models::markdown_key(card, snap.version);
    let path = output.unwrap_or_else(|| Path::new(&default_name));
    std::fs::write(path, &snap.content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!(
        "Wrote card {} version {} to {}",
        card,
        snap.version,
        path.display()
    );

    app.store.pool().close().await;
    Ok(())
}
