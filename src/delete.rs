//! `ume delete`: remove a card, its blobs, and every derived row.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};

use umesao_core::models::CardId;

use crate::app::App;
use crate::config::Config;

pub async fn run_delete(config: &Config, card: CardId, yes: bool) -> Result<()> {
    if !yes {
        if !atty::is(atty::Stream::Stdin) {
            bail!("Refusing to delete card {} without --yes on a non-interactive terminal", card);
        }
        if !confirm(card)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let app = App::open(config).await?;
    let report = app
        .manager()
        .delete(card)
        .await
        .with_context(|| format!("Failed to delete card {}", card))?;

    println!("Deleted card {}.", card);
    println!("  blobs removed: {}", report.blobs_deleted);
    if report.blob_failures > 0 {
        println!(
            "  blobs left behind: {} (see warnings on stderr)",
            report.blob_failures
        );
    }

    app.store.pool().close().await;
    Ok(())
}

fn confirm(card: CardId) -> Result<bool> {
    print!("Delete card {} and all of its versions? [y/N] ", card);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }
}
