//! `ume edit`: replace a card's markdown with an edited copy.
//!
//! Without `--file`, the latest markdown is written to
//! `$TMPDIR/{card}_{version}.md` and opened in the configured editor. The
//! edit is compared against exactly what was downloaded; unchanged content
//! creates no version.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};

use umesao_core::lifecycle::{EditOutcome, MarkdownSnapshot};
use umesao_core::models::{markdown_key, CardId};

use crate::app::App;
use crate::config::Config;

pub async fn run_edit(config: &Config, card: CardId, file: Option<&Path>) -> Result<()> {
    let app = App::open(config).await?;
    let manager = app.manager();
    let embedder = app.embedder()?;

    let downloaded = manager
        .latest_markdown(card)
        .await
        .with_context(|| format!("Failed to download markdown of card {}", card))?;

    let edited = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => edit_in_editor(&config.editor.resolve(), &downloaded)?,
    };

    let outcome = manager
        .apply_edit(card, &downloaded, &edited, embedder.as_ref())
        .await
        .with_context(|| format!("Failed to record edit of card {}", card))?;

    match outcome {
        EditOutcome::Unchanged { version } => {
            println!("No changes; card {} stays at version {}.", card, version);
        }
        EditOutcome::Created {
            version,
            chunks_stored,
        } => {
            println!(
                "Card {} updated to version {} ({} chunks stored).",
                card, version, chunks_stored
            );
        }
    }

    app.store.pool().close().await;
    Ok(())
}

fn edit_in_editor(editor: &str, snapshot: &MarkdownSnapshot) -> Result<String> {
    let path = scratch_path(snapshot);
    std::fs::write(&path, &snapshot.content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    let result = run_editor(editor, &path)
        .and_then(|()| {
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))
        });
    let _ = std::fs::remove_file(&path);
    result
}

fn scratch_path(snapshot: &MarkdownSnapshot) -> PathBuf {
    std::env::temp_dir().join(markdown_key(snapshot.card_id, snapshot.version))
}

/// Run `editor` on `path`. The command may carry arguments, e.g. `code -w`.
fn run_editor(editor: &str, path: &Path) -> Result<()> {
    let mut parts = editor.split_whitespace();
    let program = parts.next().context("Editor command is empty")?;
    let status = Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to launch editor '{}'", editor))?;
    if !status.success() {
        bail!("Editor '{}' exited with {}", editor, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(content: &str) -> MarkdownSnapshot {
        MarkdownSnapshot {
            card_id: CardId(4242),
            version: 3,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_scratch_file_named_after_markdown_key() {
        let path = scratch_path(&snapshot(""));
        assert_eq!(path.file_name().unwrap(), "4242_3.md");
    }

    #[cfg(unix)]
    #[test]
    fn test_noop_editor_returns_download() {
        let text = edit_in_editor("true", &snapshot("# Card\n")).unwrap();
        assert_eq!(text, "# Card\n");
        assert!(!scratch_path(&snapshot("")).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_editor_is_error() {
        let other = MarkdownSnapshot {
            card_id: CardId(4243),
            ..snapshot("x")
        };
        assert!(edit_in_editor("false", &other).is_err());
    }

    #[test]
    fn test_empty_editor_is_error() {
        assert!(run_editor("  ", Path::new("x.md")).is_err());
    }
}
