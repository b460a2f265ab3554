//! SQLite-backed [`Store`] implementation.
//!
//! Every constraint the pipeline depends on is declared in the schema (see
//! [`crate::migrate`]) and enforced by SQLite: composite primary keys,
//! foreign keys, the `version >= 1` check, and `ON DELETE CASCADE` from
//! cards down to chunks. Constraint failures surface as
//! [`Error::StorageConstraint`]; anything else as [`Error::Storage`].
//!
//! Vectors are stored as little-endian `f32` BLOBs. Nearest-neighbour search
//! loads the latest-version rows for one model in scan order and ranks them
//! in process.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use umesao_core::embedding::{blob_to_vec, vec_to_blob};
use umesao_core::error::{Error, Result};
use umesao_core::models::{
    CardId, ChunkEmbedding, ChunkHit, DocumentVersion, ExtractionMethod, Image, NewImage,
    StoreStats,
};
use umesao_core::store::{rank_candidates, Store};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Translate a sqlx error, separating constraint violations from the rest.
fn db_error(operation: &str, err: sqlx::Error) -> Error {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() {
            return Error::constraint(operation, db.message());
        }
    }
    Error::storage(operation, err)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn version_from_row(row: &SqliteRow) -> DocumentVersion {
    DocumentVersion {
        card_id: CardId(row.get("card_id")),
        version: row.get("version"),
        content_hash: row.get("hash"),
        created_at: row.get("created_at"),
    }
}

fn image_from_row(row: &SqliteRow) -> Result<Image> {
    let method: String = row.get("method");
    let method = method
        .parse::<ExtractionMethod>()
        .map_err(|e| Error::storage("read image", e))?;
    Ok(Image {
        card_id: CardId(row.get("card_id")),
        filename: row.get("filename"),
        method,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_card(&self) -> Result<CardId> {
        let result = sqlx::query("INSERT INTO cards (created_at) VALUES (?)")
            .bind(now())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("create card", e))?;
        Ok(CardId(result.last_insert_rowid()))
    }

    async fn card_exists(&self, card_id: CardId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM cards WHERE id = ?")
            .bind(card_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("check card", e))?;
        Ok(exists)
    }

    async fn delete_card(&self, card_id: CardId) -> Result<()> {
        let result = sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(card_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete card", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("card", card_id));
        }
        Ok(())
    }

    async fn insert_image(&self, image: &NewImage) -> Result<Image> {
        let created_at = now();
        sqlx::query(
            "INSERT INTO images (card_id, filename, method, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(image.card_id.0)
        .bind(&image.filename)
        .bind(image.method.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert image", e))?;

        Ok(Image {
            card_id: image.card_id,
            filename: image.filename.clone(),
            method: image.method,
            created_at,
        })
    }

    async fn card_image(&self, card_id: CardId) -> Result<Option<Image>> {
        let row = sqlx::query(
            "SELECT card_id, filename, method, created_at FROM images \
             WHERE card_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(card_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get card image", e))?;

        row.as_ref().map(image_from_row).transpose()
    }

    async fn insert_version(
        &self,
        card_id: CardId,
        version: i64,
        content_hash: &str,
    ) -> Result<DocumentVersion> {
        let created_at = now();
        sqlx::query(
            "INSERT INTO markdowns (card_id, version, hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(card_id.0)
        .bind(version)
        .bind(content_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert version", e))?;

        Ok(DocumentVersion {
            card_id,
            version,
            content_hash: content_hash.to_string(),
            created_at,
        })
    }

    /// Chunks go with the row through the `(card_id, version)` cascade.
    async fn delete_version(&self, card_id: CardId, version: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM markdowns WHERE card_id = ? AND version = ?")
            .bind(card_id.0)
            .bind(version)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete version", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(
                "version",
                format!("{} of card {}", version, card_id),
            ));
        }
        Ok(())
    }

    async fn latest_version(&self, card_id: CardId) -> Result<Option<DocumentVersion>> {
        let row = sqlx::query(
            "SELECT card_id, version, hash, created_at FROM markdowns \
             WHERE card_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(card_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("get latest version", e))?;

        Ok(row.as_ref().map(version_from_row))
    }

    async fn versions(&self, card_id: CardId) -> Result<Vec<DocumentVersion>> {
        let rows = sqlx::query(
            "SELECT card_id, version, hash, created_at FROM markdowns \
             WHERE card_id = ? ORDER BY version ASC",
        )
        .bind(card_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list versions", e))?;

        Ok(rows.iter().map(version_from_row).collect())
    }

    async fn insert_chunk(&self, chunk: &ChunkEmbedding) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chunks (card_id, version, chunk_index, model, text, embedding, dims)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(chunk.card_id.0)
        .bind(chunk.version)
        .bind(chunk.chunk_index)
        .bind(&chunk.model)
        .bind(&chunk.text)
        .bind(vec_to_blob(&chunk.embedding))
        .bind(chunk.embedding.len() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert chunk", e))?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM cards) AS cards,
                (SELECT COUNT(*) FROM images) AS images,
                (SELECT COUNT(*) FROM markdowns) AS versions,
                (SELECT COUNT(*) FROM chunks) AS chunks
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("stats", e))?;

        Ok(StoreStats {
            cards: row.get("cards"),
            images: row.get("images"),
            versions: row.get("versions"),
            chunks: row.get("chunks"),
        })
    }

    async fn nearest_latest_chunks(
        &self,
        query: &[f32],
        model: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChunkHit>> {
        let rows = sqlx::query(
            r#"
            SELECT c.card_id, c.version, c.chunk_index, c.model, c.text, c.embedding
            FROM chunks c
            JOIN (
                SELECT card_id, MAX(version) AS version
                FROM markdowns
                GROUP BY card_id
            ) latest ON latest.card_id = c.card_id AND latest.version = c.version
            WHERE c.model = ? AND c.dims = ?
            ORDER BY c.card_id, c.version, c.chunk_index
            "#,
        )
        .bind(model)
        .bind(query.len() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("vector search", e))?;

        let candidates = rows.iter().map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            ChunkEmbedding {
                card_id: CardId(row.get("card_id")),
                version: row.get("version"),
                chunk_index: row.get("chunk_index"),
                model: row.get("model"),
                text: row.get("text"),
                embedding: blob_to_vec(&blob),
            }
        });

        Ok(rank_candidates(query, candidates, limit))
    }
}
