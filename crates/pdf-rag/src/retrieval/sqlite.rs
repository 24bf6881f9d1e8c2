//! SQLite-backed durable vector index
//!
//! Records for every collection share one `records` table. The `seq` column
//! preserves insertion order, which breaks score ties. Writers are serialised
//! by the connection mutex and every upsert is one transaction.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{IndexRecord, Metadata, QueryResult};

use super::{
    check_k, check_query_dimensions, cosine_similarity, validate_batch, TopK, VectorIndex,
};

/// How long a connection waits on another handle's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable vector index over a named collection
#[derive(Clone)]
pub struct SqliteVectorIndex {
    conn: Arc<Mutex<Connection>>,
    collection: String,
    dimensions: usize,
}

impl SqliteVectorIndex {
    /// Create or open the index file and register the collection
    pub fn open<P: AsRef<Path>>(path: P, collection: &str, dimensions: usize) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("Failed to open database: {}", e)))?;
        Self::init(conn, collection, dimensions)
    }

    /// Create an in-memory index
    pub fn in_memory(collection: &str, dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory database: {}", e)))?;
        Self::init(conn, collection, dimensions)
    }

    fn init(conn: Connection, collection: &str, dimensions: usize) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::storage(format!("Failed to set busy timeout: {}", e)))?;
        let index = Self {
            conn: Arc::new(Mutex::new(conn)),
            collection: collection.to_string(),
            dimensions,
        };
        index.migrate()?;
        index.register_collection()?;
        Ok(index)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            "#,
        )
        .map_err(|e| Error::storage(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimensions INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                vector BLOB NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,
                inserted_at TEXT NOT NULL,
                UNIQUE(collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection, seq);
            "#,
        )
        .map_err(|e| Error::storage(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    /// Pin the collection dimension on first use; refuse a different one later
    fn register_collection(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, dimensions, created_at) VALUES (?1, ?2, ?3)",
            params![self.collection, self.dimensions as i64, Utc::now().to_rfc3339()],
        )?;
        let stored: i64 = conn.query_row(
            "SELECT dimensions FROM collections WHERE name = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        if stored as usize != self.dimensions {
            return Err(Error::Config(format!(
                "Collection '{}' holds {}-dimensional vectors, provider produces {}",
                self.collection, stored, self.dimensions
            )));
        }
        Ok(())
    }

    /// Collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn upsert_blocking(&self, records: &[IndexRecord]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        {
            let mut exists =
                tx.prepare_cached("SELECT 1 FROM records WHERE collection = ?1 AND id = ?2")?;
            validate_batch(records, self.dimensions, |id| {
                Ok(exists
                    .query_row(params![self.collection, id], |_| Ok(()))
                    .optional()?
                    .is_some())
            })?;
        }

        let inserted_at = Utc::now().to_rfc3339();
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO records (collection, id, vector, text, metadata, inserted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                insert.execute(params![
                    self.collection,
                    record.id,
                    encode_vector(&record.vector),
                    record.text,
                    serde_json::to_string(&record.metadata)?,
                    inserted_at,
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(
            "Committed {} records to collection '{}'",
            records.len(),
            self.collection
        );
        Ok(())
    }

    fn query_blocking(&self, vector: &[f32], k: usize) -> Result<QueryResult> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT vector, id, text FROM records WHERE collection = ?1 ORDER BY seq",
        )?;
        let mut rows = stmt.query(params![self.collection])?;

        let mut top = TopK::new(k);
        while let Some(row) = rows.next()? {
            let blob: Vec<u8> = row.get(0)?;
            let score = cosine_similarity(vector, &decode_vector(&blob)?);
            if top.accepts(score) {
                top.offer(score, row.get(1)?, row.get(2)?);
            }
        }
        Ok(top.into_result())
    }

    fn len_blocking(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn contains_blocking(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM records WHERE collection = ?1 AND id = ?2",
                params![self.collection, id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn reset_blocking(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM records WHERE collection = ?1",
            params![self.collection],
        )?;
        tracing::info!("Reset collection '{}' ({} records)", self.collection, removed);
        Ok(removed)
    }

    /// Load one record by id
    pub fn get(&self, id: &str) -> Result<Option<IndexRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT vector, text, metadata FROM records WHERE collection = ?1 AND id = ?2",
                params![self.collection, id],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(blob, text, metadata)| -> Result<IndexRecord> {
            Ok(IndexRecord {
                id: id.to_string(),
                vector: decode_vector(&blob)?,
                text,
                metadata: serde_json::from_str::<Metadata>(&metadata)?,
            })
        })
        .transpose()
    }

    /// Run blocking SQLite work off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SqliteVectorIndex) -> Result<T> + Send + 'static,
    {
        let index = self.clone();
        tokio::task::spawn_blocking(move || f(index))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        self.blocking(move |index| index.upsert_blocking(&records)).await
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<QueryResult> {
        check_k(k)?;
        check_query_dimensions(vector, self.dimensions)?;
        let vector = vector.to_vec();
        self.blocking(move |index| index.query_blocking(&vector, k)).await
    }

    async fn len(&self) -> Result<usize> {
        self.blocking(|index| index.len_blocking()).await
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.blocking(move |index| index.contains_blocking(&id)).await
    }

    async fn reset(&self) -> Result<usize> {
        self.blocking(|index| index.reset_blocking()).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::storage(format!(
            "Corrupt vector blob of {} bytes",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
