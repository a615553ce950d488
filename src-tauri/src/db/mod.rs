pub mod models;

use crate::embedding::{bytes_to_embedding, embedding_to_bytes};
use models::{Chunk, EmbeddedChunk};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Result};

/// How `prepare_collection` treats a collection that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionMode {
    pub overwrite: bool,
    pub get_or_create: bool,
}

/// What `prepare_collection` did, so the caller knows whether to index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Created,
    Reused,
}

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("collection `{0}` already exists")]
    AlreadyExists(String),
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(app_dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(app_dir).ok();
        let db_path = app_dir.join("transfer-master.db");
        Self::from_connection(Connection::open(db_path)?)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                source TEXT NOT NULL,
                content TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS llm_cache (
                key TEXT PRIMARY KEY,
                response TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(())
    }

    // ── Collections ──

    /// Create, recreate or reuse a collection depending on `mode`. The
    /// existence check and the write share one transaction.
    pub fn prepare_collection(
        &self,
        name: &str,
        mode: CollectionMode,
    ) -> std::result::Result<CollectionState, CollectionError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM collections WHERE name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        let state = match (exists, mode.overwrite, mode.get_or_create) {
            (false, _, _) => {
                tx.execute("INSERT INTO collections (name) VALUES (?1)", params![name])?;
                CollectionState::Created
            }
            (true, true, _) => {
                tx.execute("DELETE FROM chunks WHERE collection = ?1", params![name])?;
                tx.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
                tx.execute("INSERT INTO collections (name) VALUES (?1)", params![name])?;
                CollectionState::Created
            }
            (true, false, true) => CollectionState::Reused,
            (true, false, false) => return Err(CollectionError::AlreadyExists(name.to_string())),
        };
        tx.commit()?;
        Ok(state)
    }

    // ── Chunks ──

    pub fn insert_chunks(&self, chunks: &[(Chunk, Vec<f32>)]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for (chunk, embedding) in chunks {
            tx.execute(
                "INSERT INTO chunks (id, collection, source, content, chunk_index, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    chunk.id,
                    chunk.collection,
                    chunk.source,
                    chunk.content,
                    chunk.chunk_index,
                    embedding_to_bytes(embedding)
                ],
            )?;
        }
        tx.commit()
    }

    pub fn embedded_chunks(&self, collection: &str) -> Result<Vec<EmbeddedChunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, collection, source, content, chunk_index, embedding FROM chunks
             WHERE collection = ?1 ORDER BY source, chunk_index",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            let bytes: Vec<u8> = row.get(5)?;
            Ok(EmbeddedChunk {
                chunk: Chunk {
                    id: row.get(0)?,
                    collection: row.get(1)?,
                    source: row.get(2)?,
                    content: row.get(3)?,
                    chunk_index: row.get(4)?,
                },
                embedding: bytes_to_embedding(&bytes),
            })
        })?;
        rows.collect()
    }

    pub fn chunk_count(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ── LLM cache ──

    pub fn cached_response(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT response FROM llm_cache WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
    }

    pub fn store_response(&self, key: &str, response: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO llm_cache (key, response) VALUES (?1, ?2)",
            params![key, response],
        )?;
        Ok(())
    }
}
