use std::path::Path;

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use super::snapshot::IndexedRecord;
use crate::error::IndexError;
use crate::models::{DocumentRecord, Metadata};
use crate::utils::{calculate_checksum, ensure_parent_dir};

const SCHEMA_VERSION: &str = "1";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    seq INTEGER NOT NULL UNIQUE,
    text TEXT NOT NULL,
    metadata TEXT NOT NULL,
    checksum TEXT NOT NULL,
    dimension INTEGER NOT NULL,
    vector BLOB NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Everything read back from disk at startup.
pub(crate) struct LoadedIndex {
    pub dimension: Option<usize>,
    pub entries: Vec<IndexedRecord>,
    pub updated_at: Option<String>,
}

/// SQLite persistence for index records.
pub(crate) struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        ensure_parent_dir(path)?;
        let conn = Connection::open(path).map_err(classify)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, IndexError> {
        let check: String = conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(classify)?;
        if check != "ok" {
            return Err(IndexError::StorageCorruption(check));
        }

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(classify)?;
        conn.execute_batch(SCHEMA).map_err(classify)?;

        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(classify)?;
        match version.as_deref() {
            None => {
                conn.execute(
                    "INSERT INTO index_meta (key, value) VALUES ('schema_version', ?1)",
                    params![SCHEMA_VERSION],
                )?;
            }
            Some(SCHEMA_VERSION) => {}
            Some(other) => {
                return Err(IndexError::StorageCorruption(format!(
                    "unsupported schema version: {other}"
                )));
            }
        }

        Ok(Self { conn })
    }

    /// Read and validate every stored record, in insertion order.
    pub fn load(&self) -> Result<LoadedIndex, IndexError> {
        let dimension = match self.meta("dimension")? {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                IndexError::StorageCorruption(format!("invalid stored dimension: {raw}"))
            })?),
            None => None,
        };
        let updated_at = self.meta("updated_at")?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, seq, text, metadata, checksum, dimension, vector
                 FROM records ORDER BY seq",
            )
            .map_err(classify)?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredRow {
                id: row.get(0)?,
                seq: row.get(1)?,
                text: row.get(2)?,
                metadata: row.get(3)?,
                checksum: row.get(4)?,
                dimension: row.get(5)?,
                vector: row.get(6)?,
            })
        })
        .map_err(classify)?;

        let mut entries = Vec::new();
        for row in rows {
            let row = row.map_err(classify)?;
            let expected = dimension.ok_or_else(|| {
                IndexError::StorageCorruption("records stored without a dimension".to_string())
            })?;
            entries.push(row.decode(expected)?);
        }

        Ok(LoadedIndex {
            dimension,
            entries,
            updated_at,
        })
    }

    /// Upsert entries and the index dimension in one transaction.
    pub fn write_batch(
        &mut self,
        entries: &[IndexedRecord],
        dimension: usize,
        updated_at: &str,
    ) -> Result<(), IndexError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (id, seq, text, metadata, checksum, dimension, vector, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    metadata = excluded.metadata,
                    checksum = excluded.checksum,
                    dimension = excluded.dimension,
                    vector = excluded.vector,
                    updated_at = excluded.updated_at",
            )?;
            for entry in entries {
                let metadata = serde_json::to_string(&entry.record.metadata)
                    .map_err(|e| IndexError::StorageCorruption(e.to_string()))?;
                stmt.execute(params![
                    entry.record.id,
                    entry.seq as i64,
                    entry.record.text,
                    metadata,
                    entry.record.checksum,
                    dimension as i64,
                    encode_vector(&entry.vector),
                    updated_at,
                ])?;
            }

            let mut meta = tx.prepare(
                "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            meta.execute(params!["dimension", dimension.to_string()])?;
            meta.execute(params!["updated_at", updated_at])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn meta(&self, key: &str) -> Result<Option<String>, IndexError> {
        self.conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(classify)
    }
}

struct StoredRow {
    id: String,
    seq: i64,
    text: String,
    metadata: String,
    checksum: String,
    dimension: i64,
    vector: Vec<u8>,
}

impl StoredRow {
    fn decode(self, expected_dimension: usize) -> Result<IndexedRecord, IndexError> {
        let corrupt = |what: String| IndexError::StorageCorruption(format!("record {}: {what}", self.id));

        if self.dimension != expected_dimension as i64 {
            return Err(corrupt(format!(
                "dimension {} does not match index dimension {expected_dimension}",
                self.dimension
            )));
        }
        let seq = u64::try_from(self.seq).map_err(|_| corrupt(format!("negative seq {}", self.seq)))?;
        let vector = decode_vector(&self.vector, expected_dimension).map_err(corrupt)?;
        let metadata: Metadata =
            serde_json::from_str(&self.metadata).map_err(|e| corrupt(format!("metadata: {e}")))?;
        if calculate_checksum(&self.text) != self.checksum {
            return Err(corrupt("text does not match checksum".to_string()));
        }

        let record = DocumentRecord {
            id: self.id.clone(),
            text: self.text.clone(),
            metadata,
            checksum: self.checksum.clone(),
        };
        Ok(IndexedRecord::new(record, vector, seq))
    }
}

/// Map SQLite's "this is not a usable database" failures to corruption.
fn classify(err: rusqlite::Error) -> IndexError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if matches!(e.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) =>
        {
            IndexError::StorageCorruption(err.to_string())
        }
        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
            IndexError::StorageCorruption(err.to_string())
        }
        // A table of ours exists but with another layout
        _ if is_foreign_layout(&err) => {
            IndexError::StorageCorruption(format!("unexpected table layout: {err}"))
        }
        other => IndexError::Storage(other),
    }
}

fn is_foreign_layout(err: &rusqlite::Error) -> bool {
    let message = err.to_string();
    message.contains("no such column") || message.contains("no such table")
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vector(blob: &[u8], dimension: usize) -> Result<Vec<f32>, String> {
    let expected_len = dimension * std::mem::size_of::<f32>();
    if blob.len() != expected_len {
        return Err(format!(
            "vector has {} bytes, expected {expected_len}",
            blob.len()
        ));
    }

    let mut out = Vec::with_capacity(dimension);
    for chunk in blob.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            return Err("vector contains non-finite values".to_string());
        }
        out.push(value);
    }
    Ok(out)
}
