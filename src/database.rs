use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// JSON documents grouped in named collections, stored in SQLite.
///
/// Inserts are plain appends: loading the same batch twice stores it twice.
pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open document store at {}", path))?;
        Self::with_connection(conn)
    }

    #[allow(dead_code)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = DocumentStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                collection TEXT NOT NULL,
                body TEXT NOT NULL,
                inserted_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_collection ON documents(collection)",
            [],
        )?;

        Ok(())
    }

    /// Inserts every document in one transaction and returns how many were stored
    pub fn insert_many<T: Serialize>(&mut self, collection: &str, documents: &[T]) -> Result<usize> {
        let inserted_at = Utc::now();
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (id, collection, body, inserted_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for document in documents {
                let body = serde_json::to_string(document).context("Failed to serialize document")?;
                stmt.execute(params![Uuid::new_v4().to_string(), collection, body, inserted_at])?;
            }
        }

        tx.commit().context("Failed to commit documents")?;
        tracing::debug!("Inserted {} documents into '{}'", documents.len(), collection);
        Ok(documents.len())
    }

    pub fn count(&self, collection: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// All documents of a collection, in insertion order
    #[allow(dead_code)]
    pub fn find_all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(
            "SELECT body FROM documents WHERE collection = ?1 ORDER BY seq",
        )?;

        let bodies = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).context("Stored document is not valid JSON"))
            .collect()
    }
}
