use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};
use tokio::task;

/// A passage retrieved from the document store. Ephemeral, produced
/// per-query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: i64,
    pub document_name: String,
    pub chunk_text: String,
    pub department: Option<String>,
    pub process_owner: Option<String>,
    pub relevance_score: f64,
}

/// Sqlite-backed document store with a sqlite-vec `vec0` index over chunk
/// embeddings. Ingestion happens out-of-process; this crate only inserts
/// for tests and searches.
#[derive(Clone)]
pub struct DocumentStore {
    db: Arc<Mutex<Connection>>,
    dimensions: usize,
}

/// Initialize sqlite-vec extension. Must be called before Connection::open().
fn init_sqlite_vec() {
    use rusqlite::ffi::{sqlite3, sqlite3_api_routines, sqlite3_auto_extension};

    type Sqlite3AutoExtFn =
        unsafe extern "C" fn(*mut sqlite3, *mut *mut i8, *const sqlite3_api_routines) -> i32;

    unsafe {
        sqlite3_auto_extension(Some(std::mem::transmute::<*const (), Sqlite3AutoExtFn>(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    }
}

fn embedding_to_json(embedding: &[f32]) -> String {
    serde_json::to_string(embedding).unwrap_or_else(|_| "[]".to_owned())
}

impl DocumentStore {
    pub fn open(path: &str, dimensions: usize) -> Result<Self> {
        init_sqlite_vec();
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn, dimensions)
    }

    pub fn open_in_memory(dimensions: usize) -> Result<Self> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, dimensions)
    }

    fn from_connection(conn: Connection, dimensions: usize) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS document_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_name TEXT NOT NULL,
                chunk_text TEXT NOT NULL,
                department TEXT,
                process_owner TEXT
            );",
        )?;
        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS document_chunks_vec
             USING vec0(chunk_id INTEGER PRIMARY KEY, embedding float[{dimensions}]);"
        ))?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub async fn insert_chunk(
        &self,
        document_name: &str,
        chunk_text: &str,
        department: Option<&str>,
        process_owner: Option<&str>,
        embedding: &[f32],
    ) -> Result<i64> {
        if embedding.len() != self.dimensions {
            return Err(anyhow!(
                "embedding has {} dimensions, store expects {}",
                embedding.len(),
                self.dimensions
            ));
        }

        let db = Arc::clone(&self.db);
        let document_name = document_name.to_owned();
        let chunk_text = chunk_text.to_owned();
        let department = department.map(ToOwned::to_owned);
        let process_owner = process_owner.map(ToOwned::to_owned);
        let embedding_json = embedding_to_json(embedding);

        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO document_chunks(document_name, chunk_text, department, process_owner)
                 VALUES (?1, ?2, ?3, ?4)",
                params![document_name, chunk_text, department, process_owner],
            )?;
            let chunk_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT OR REPLACE INTO document_chunks_vec(chunk_id, embedding) VALUES (?1, ?2)",
                params![chunk_id, embedding_json],
            )?;
            tx.commit()?;
            Ok::<i64, anyhow::Error>(chunk_id)
        })
        .await?
    }

    /// K-nearest-neighbour search, highest similarity first. The sqlite-vec
    /// distance is converted to a similarity score in [0, 1] and rows below
    /// `min_score` are dropped.
    pub async fn vector_search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let db = Arc::clone(&self.db);
        let query_json = embedding_to_json(query_vector);

        let mut chunks = task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let mut stmt = conn.prepare(
                r#"
                SELECT v.chunk_id, c.document_name, c.chunk_text, c.department,
                       c.process_owner, v.distance
                FROM document_chunks_vec v
                JOIN document_chunks c ON c.id = v.chunk_id
                WHERE v.embedding MATCH ?1 AND k = ?2
                "#,
            )?;
            let rows = stmt.query_map(params![query_json, top_k as i64], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, Option<String>>(4)?,
                    r.get::<_, f64>(5)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (id, document_name, chunk_text, department, process_owner, distance) = row?;
                out.push(RetrievedChunk {
                    id,
                    document_name,
                    chunk_text,
                    department,
                    process_owner,
                    relevance_score: (1.0_f64 - distance).max(0.0_f64),
                });
            }
            Ok::<Vec<RetrievedChunk>, anyhow::Error>(out)
        })
        .await??;

        chunks.retain(|c| c.relevance_score >= min_score);
        chunks.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        Ok(chunks)
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| anyhow!("failed to lock sqlite connection"))?;
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM document_chunks", [], |r| r.get(0))?;
            Ok::<usize, anyhow::Error>(count as usize)
        })
        .await?
    }
}
