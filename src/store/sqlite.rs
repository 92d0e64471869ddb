//! SQLite backend
//!
//! Documents are stored as JSON text keyed by (collection, id). A batch is a
//! single SQLite transaction, so a failed write rolls back the whole batch.

use super::{
    error::StoreError,
    live::{DocumentBackend, RealtimeStore},
    path::{CollectionPath, DocPath},
    write::ResolvedWrite,
    Document, StoreResult,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

/// SQLite-backed document storage
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!("Failed to create database directory: {}", e))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        let mut backend = Self { conn };
        backend.init_schema()?;
        info!("Opened document database at {}", path.display());
        Ok(backend)
    }

    /// In-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let mut backend = Self { conn };
        backend.init_schema()?;
        Ok(backend)
    }

    fn init_schema(&mut self) -> StoreResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                fields TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
            [],
        )?;
        Ok(())
    }
}

fn decode_fields(path: &DocPath, raw: &str) -> StoreResult<Map<String, Value>> {
    serde_json::from_str(raw).map_err(|e| StoreError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn load_from(conn: &Connection, path: &DocPath) -> StoreResult<Option<Map<String, Value>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT fields FROM documents WHERE collection = ?1 AND id = ?2",
            params![path.parent().as_str(), path.id()],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|r| decode_fields(path, &r)).transpose()
}

impl DocumentBackend for SqliteBackend {
    fn load(&self, path: &DocPath) -> StoreResult<Option<Map<String, Value>>> {
        load_from(&self.conn, path)
    }

    fn scan(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, fields FROM documents WHERE collection = ?1")?;

        let rows = stmt.query_map(params![collection.as_str()], |row| {
            let id: String = row.get(0)?;
            let fields: String = row.get(1)?;
            Ok((id, fields))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, raw) = row?;
            let path = collection.doc(id);
            let fields = decode_fields(&path, &raw)?;
            docs.push(Document::new(path, fields));
        }
        Ok(docs)
    }

    fn commit(&mut self, writes: &[ResolvedWrite], fail_at: Option<usize>) -> StoreResult<()> {
        let tx = self.conn.transaction()?;

        for (index, write) in writes.iter().enumerate() {
            if fail_at == Some(index) {
                // Dropping `tx` rolls back everything staged so far
                return Err(StoreError::Unavailable(format!(
                    "injected fault at write {} ({})",
                    index, write.target
                )));
            }
            let current = load_from(&tx, &write.target)?;
            match write.apply(current)? {
                Some(fields) => {
                    let raw = serde_json::to_string(&fields)
                        .map_err(|e| StoreError::Backend(e.to_string()))?;
                    tx.execute(
                        "INSERT OR REPLACE INTO documents (collection, id, fields) VALUES (?1, ?2, ?3)",
                        params![write.target.parent().as_str(), write.target.id(), raw],
                    )?;
                }
                None => {
                    tx.execute(
                        "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                        params![write.target.parent().as_str(), write.target.id()],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }
}

/// Realtime store persisted in SQLite.
pub type SqliteStore = RealtimeStore<SqliteBackend>;

impl SqliteStore {
    /// Open a persistent store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self::with_backend(SqliteBackend::open(path)?))
    }

    /// Store backed by an in-memory SQLite database
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::with_backend(SqliteBackend::open_in_memory()?))
    }
}
