//! Persistent vector index with exact cosine top-k search.
//!
//! Reads go through an immutable [`IndexSnapshot`] so queries never block on
//! writers and never observe a half-applied batch. Writers are serialized,
//! commit to SQLite first, and only then publish the new snapshot.

mod snapshot;
mod storage;

pub use snapshot::{IndexSnapshot, IndexedRecord};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use crate::error::IndexError;
use crate::models::{DocumentRecord, RetrievalResult};
use storage::SqliteStorage;

/// What a call to [`VectorIndex::insert_batch`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

impl InsertOutcome {
    pub fn total(&self) -> usize {
        self.inserted + self.replaced + self.unchanged
    }
}

pub struct VectorIndex {
    storage: Mutex<SqliteStorage>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    path: Option<PathBuf>,
}

impl VectorIndex {
    /// Open or create the index file at `path` and load it into memory.
    ///
    /// Fails with [`IndexError::StorageCorruption`] if the file exists but
    /// cannot be read back consistently.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let storage = SqliteStorage::open(path)?;
        let index = Self::from_storage(storage, Some(path.to_path_buf()))?;
        tracing::info!(
            path = %path.display(),
            records = index.len(),
            dimension = ?index.dimension(),
            "opened vector index"
        );
        Ok(index)
    }

    /// A non-persistent index, mostly for tests and benchmarks.
    pub fn in_memory() -> Result<Self, IndexError> {
        Self::from_storage(SqliteStorage::open_in_memory()?, None)
    }

    fn from_storage(storage: SqliteStorage, path: Option<PathBuf>) -> Result<Self, IndexError> {
        let loaded = storage.load()?;
        let snapshot = IndexSnapshot::from_entries(loaded.dimension, loaded.entries, loaded.updated_at);
        Ok(Self {
            storage: Mutex::new(storage),
            snapshot: RwLock::new(Arc::new(snapshot)),
            path,
        })
    }

    /// Insert records with their vectors as one atomic batch.
    ///
    /// The whole batch is validated before anything is written: on error the
    /// index is left exactly as it was. A record whose id is already present
    /// replaces the stored one and keeps its original insertion position.
    /// Within a batch the last occurrence of an id wins.
    pub fn insert_batch(
        &self,
        records: &[DocumentRecord],
        vectors: &[Vec<f32>],
    ) -> Result<InsertOutcome, IndexError> {
        if records.len() != vectors.len() {
            return Err(IndexError::CountMismatch {
                records: records.len(),
                vectors: vectors.len(),
            });
        }
        if records.is_empty() {
            return Ok(InsertOutcome::default());
        }

        let mut storage = self.storage.lock();
        let current = self.snapshot();
        let dimension = validate_vectors(current.dimension(), vectors)?;

        // Collapse duplicate ids, keeping the position of the first occurrence
        // and the content of the last.
        let mut order: Vec<usize> = Vec::with_capacity(records.len());
        let mut slot: HashMap<&str, usize> = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            match slot.get(record.id.as_str()) {
                Some(&i) => order[i] = pos,
                None => {
                    slot.insert(record.id.as_str(), order.len());
                    order.push(pos);
                }
            }
        }

        let mut outcome = InsertOutcome::default();
        let mut staged = Vec::with_capacity(order.len());
        let mut next_seq = current.next_seq();
        for pos in order {
            let record = &records[pos];
            match current.get(&record.id) {
                Some(existing) => {
                    let entry = IndexedRecord::new(record.clone(), vectors[pos].clone(), existing.seq);
                    if existing.same_content(&entry) {
                        outcome.unchanged += 1;
                    } else {
                        outcome.replaced += 1;
                        staged.push(entry);
                    }
                }
                None => {
                    staged.push(IndexedRecord::new(record.clone(), vectors[pos].clone(), next_seq));
                    next_seq += 1;
                    outcome.inserted += 1;
                }
            }
        }

        if staged.is_empty() {
            tracing::debug!(unchanged = outcome.unchanged, "batch already indexed");
            return Ok(outcome);
        }

        let updated_at = Utc::now().to_rfc3339();
        storage.write_batch(&staged, dimension, &updated_at)?;

        let next = current.with_upserts(dimension, staged, updated_at);
        *self.snapshot.write() = Arc::new(next);

        tracing::debug!(
            inserted = outcome.inserted,
            replaced = outcome.replaced,
            unchanged = outcome.unchanged,
            "committed batch"
        );
        Ok(outcome)
    }

    /// The `top_k` most similar records, best first.
    ///
    /// An empty index yields an empty list. Equal scores keep insertion order.
    pub fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>, IndexError> {
        if top_k == 0 {
            return Err(IndexError::InvalidTopK);
        }
        check_vector(0, vector)?;
        let snapshot = self.snapshot();
        let Some(dimension) = snapshot.dimension() else {
            return Ok(Vec::new());
        };
        if vector.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
                position: 0,
            });
        }
        Ok(snapshot.top_k(vector, top_k))
    }

    /// The current committed view.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.snapshot.read().dimension()
    }

    pub fn get(&self, id: &str) -> Option<Arc<IndexedRecord>> {
        self.snapshot.read().get(id).cloned()
    }

    pub fn updated_at(&self) -> Option<String> {
        self.snapshot.read().updated_at().map(str::to_string)
    }

    /// Backing file, `None` for in-memory indexes.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Check every vector and return the batch dimension.
/// Reject a vector with no components or with NaN/infinite ones.
pub(crate) fn check_vector(position: usize, vector: &[f32]) -> Result<(), IndexError> {
    if vector.is_empty() {
        return Err(IndexError::EmptyVector(position));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(IndexError::NonFiniteVector(position));
    }
    Ok(())
}

fn validate_vectors(current: Option<usize>, vectors: &[Vec<f32>]) -> Result<usize, IndexError> {
    let mut dimension = current;
    for (position, vector) in vectors.iter().enumerate() {
        check_vector(position, vector)?;
        match dimension {
            Some(expected) if expected != vector.len() => {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                    position,
                });
            }
            Some(_) => {}
            None => dimension = Some(vector.len()),
        }
    }
    dimension.ok_or(IndexError::CountMismatch {
        records: 0,
        vectors: 0,
    })
}
