//! SQLite implementation of [`DocumentStore`].
//!
//! ## Database Schema
//!
//! ```sql
//! -- Documents table: one row per ingested file version
//! CREATE TABLE documents (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,  -- never reused
//!     filename TEXT NOT NULL,                -- name relative to the source directory
//!     content TEXT NOT NULL,
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
//! );
//!
//! -- Chunks table: retrievable units with their embeddings
//! CREATE TABLE chunks (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,  -- replay order for index rebuilds
//!     document_id INTEGER NOT NULL REFERENCES documents(id),
//!     content TEXT NOT NULL,
//!     embedding BLOB NOT NULL                -- f32 vector, see encode_embedding
//! );
//! ```
//!
//! ## SQLite Configuration
//!
//! - **WAL mode**: readers do not block the single writer
//! - **synchronous = FULL**: a committed row survives power loss
//! - **Foreign keys**: chunks must point at an existing document

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use super::{
    Chunk, ChunkId, Document, DocumentId, DocumentStore, DocumentSummary, StoreStats,
    decode_embedding,
};
use crate::error::Result;

/// SQLite-backed document and chunk store. See module docs for the schema.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (or creates) the database file at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Full)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true),
        )
        .await?;
        Self::new_with_pool(pool).await
    }

    /// Opens a private in-memory database, mostly for tests.
    pub async fn open_memory() -> Result<Self> {
        // every pooled connection would otherwise see its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(
                SqliteConnectOptions::new()
                    .in_memory(true)
                    .foreign_keys(true),
            )
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_filename ON documents(filename)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)")
            .execute(pool)
            .await?;

        Ok(())
    }

    fn row_to_document(row: &SqliteRow) -> Result<Document> {
        Ok(Document {
            id: row.try_get("id")?,
            filename: row.try_get("filename")?,
            content: row.try_get("content")?,
        })
    }

    fn row_to_chunk(row: &SqliteRow, with_embedding: bool) -> Result<Chunk> {
        let id: i64 = row.try_get("id")?;
        let embedding = if with_embedding {
            let bytes: Vec<u8> = row.try_get("embedding")?;
            Some(decode_embedding(id, &bytes)?)
        } else {
            None
        };

        Ok(Chunk {
            id,
            document_id: row.try_get("document_id")?,
            content: row.try_get("content")?,
            embedding,
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn add_document(&self, filename: &str, content: &str) -> Result<DocumentId> {
        let result = sqlx::query("INSERT INTO documents (filename, content) VALUES (?1, ?2)")
            .bind(filename)
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn document_exists(&self, filename: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE filename = ?1")
            .bind(filename)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT id, filename, content FROM documents WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::row_to_document(&row)).transpose()
    }

    async fn latest_document(&self, filename: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, filename, content FROM documents
             WHERE filename = ?1 ORDER BY id DESC LIMIT 1",
        )
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_document(&row)).transpose()
    }

    async fn get_all_documents(&self) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query("SELECT id, filename FROM documents ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push(DocumentSummary {
                id: row.try_get("id")?,
                filename: row.try_get("filename")?,
            });
        }
        Ok(documents)
    }

    async fn add_chunk(
        &self,
        document_id: DocumentId,
        content: &str,
        embedding: &[u8],
    ) -> Result<ChunkId> {
        let result = sqlx::query(
            "INSERT INTO chunks (document_id, content, embedding) VALUES (?1, ?2, ?3)",
        )
        .bind(document_id)
        .bind(content)
        .bind(embedding)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_chunk(&self, id: ChunkId) -> Result<Option<Chunk>> {
        let row = sqlx::query("SELECT id, document_id, content FROM chunks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::row_to_chunk(&row, false)).transpose()
    }

    async fn get_chunks_for_document(&self, document_id: DocumentId) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, content FROM chunks WHERE document_id = ?1 ORDER BY id",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Self::row_to_chunk(row, false))
            .collect()
    }

    async fn get_all_chunks(&self) -> Result<Vec<Chunk>> {
        let rows = sqlx::query("SELECT id, document_id, content FROM chunks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Self::row_to_chunk(row, false))
            .collect()
    }

    async fn get_all_chunks_with_embeddings(&self) -> Result<Vec<Chunk>> {
        let rows =
            sqlx::query("SELECT id, document_id, content, embedding FROM chunks ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| Self::row_to_chunk(row, true))
            .collect()
    }

    async fn chunks_with_embeddings_after(
        &self,
        after: ChunkId,
        limit: usize,
    ) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, content, embedding FROM chunks
             WHERE id > ?1 ORDER BY id LIMIT ?2",
        )
        .bind(after)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Self::row_to_chunk(row, true))
            .collect()
    }

    async fn stats(&self, sample_size: usize) -> Result<StoreStats> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;

        // average chunks per document over a random sample, scaled to all documents
        let sampled: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(n), 0) FROM (
                 SELECT (SELECT COUNT(*) FROM chunks c WHERE c.document_id = d.id) AS n
                 FROM documents d ORDER BY RANDOM() LIMIT ?1
             )",
        )
        .bind(i64::try_from(sample_size).unwrap_or(i64::MAX))
        .fetch_one(&self.pool)
        .await?;

        let estimated_chunks = if sampled.0 == 0 {
            0.0
        } else {
            (sampled.1 as f64 / sampled.0 as f64) * documents as f64
        };

        Ok(StoreStats {
            documents: documents as usize,
            chunks: chunks as usize,
            estimated_chunks,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
