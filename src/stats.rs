//! Database statistics.
//!
//! Totals come from [`Store::stats`]; the per-model breakdown and the last
//! activity time are read straight from SQLite, like `ume stats` needs them
//! and nothing else does.

use anyhow::Result;
use sqlx::Row;

use umesao_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

struct ModelStats {
    model: String,
    chunk_count: i64,
    card_count: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate(&pool).await?;
    let store = SqliteStore::new(pool);
    let totals = store.stats().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    let last_version: Option<i64> = sqlx::query_scalar("SELECT MAX(created_at) FROM markdowns")
        .fetch_one(store.pool())
        .await?;

    println!("Umesao: Database Stats");
    println!("======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Cards:       {}", totals.cards);
    println!("  Images:      {}", totals.images);
    println!("  Versions:    {}", totals.versions);
    println!("  Chunks:      {}", totals.chunks);
    println!(
        "  Last edit:   {}",
        last_version
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );

    let rows = sqlx::query(
        r#"
        SELECT model, COUNT(*) AS chunk_count, COUNT(DISTINCT card_id) AS card_count
        FROM chunks
        GROUP BY model
        ORDER BY chunk_count DESC
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    let by_model: Vec<ModelStats> = rows
        .iter()
        .map(|row| ModelStats {
            model: row.get("model"),
            chunk_count: row.get("chunk_count"),
            card_count: row.get("card_count"),
        })
        .collect();

    if !by_model.is_empty() {
        println!();
        println!("  By embedding model:");
        println!("  {:<32} {:>8} {:>6}", "MODEL", "CHUNKS", "CARDS");
        println!("  {}", "-".repeat(48));
        for m in &by_model {
            let marker = if m.model == config.embedding.model {
                " *"
            } else {
                ""
            };
            println!(
                "  {:<32} {:>8} {:>6}{}",
                m.model, m.chunk_count, m.card_count, marker
            );
        }
    }

    println!();

    store.pool().close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Relative time for recent timestamps, a date for older ones.
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
