//! `ume lookup`: semantic search over the latest version of every card.

use anyhow::{Context, Result};

use umesao_core::search::{lookup, RankingPolicy};

use crate::app::App;
use crate::config::Config;

pub async fn run_lookup(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    policy: Option<&str>,
) -> Result<()> {
    let mut params = config.retrieval.params()?;
    if let Some(limit) = limit {
        params.top_k = limit;
    }
    if let Some(policy) = policy {
        params.policy = policy.parse::<RankingPolicy>()?;
    }

    let app = App::open(config).await?;
    let embedder = app.embedder()?;
    let results = lookup(&app.store, embedder.as_ref(), query, &params)
        .await
        .context("Lookup failed")?;

    if results.is_empty() {
        println!("No results.");
    }
    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. card {} (v{}) [distance {:.4}]",
            i + 1,
            r.card_id,
            r.version,
            r.distance
        );
        println!("    chunk {}: \"{}\"", r.chunk_index, excerpt(&r.text, 160));
        println!();
    }

    app.store.pool().close().await;
    Ok(())
}

/// Single-line excerpt of at most `max` characters.
fn excerpt(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}…", cut)
    }
}
