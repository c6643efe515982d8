use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use crate::models::{DocumentRecord, RetrievalResult};

/// A stored record with its vector and insertion sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    pub record: DocumentRecord,
    pub vector: Vec<f32>,
    /// Insertion order; kept when a record is replaced
    pub seq: u64,
    norm: f32,
}

impl IndexedRecord {
    pub fn new(record: DocumentRecord, vector: Vec<f32>, seq: u64) -> Self {
        let norm = l2_norm(&vector);
        Self {
            record,
            vector,
            seq,
            norm,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// Same text and same vector as `other`.
    pub fn same_content(&self, other: &IndexedRecord) -> bool {
        self.record.checksum == other.record.checksum
            && self.record.metadata == other.record.metadata
            && self.vector == other.vector
    }

    fn to_result(&self, similarity: f32) -> RetrievalResult {
        RetrievalResult {
            id: self.record.id.clone(),
            text: self.record.text.clone(),
            metadata: self.record.metadata.clone(),
            similarity,
        }
    }
}

/// An immutable view of the index contents.
///
/// Entries are kept in insertion order. A new snapshot is built for every
/// write and published in one pointer swap, so readers never see a partial
/// batch.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    dimension: Option<usize>,
    entries: Vec<Arc<IndexedRecord>>,
    by_id: HashMap<String, usize>,
    updated_at: Option<String>,
}

impl IndexSnapshot {
    /// Build from records already sorted by `seq`.
    pub(crate) fn from_entries(
        dimension: Option<usize>,
        entries: Vec<IndexedRecord>,
        updated_at: Option<String>,
    ) -> Self {
        let entries: Vec<Arc<IndexedRecord>> = entries.into_iter().map(Arc::new).collect();
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.record.id.clone(), pos))
            .collect();
        Self {
            dimension,
            entries,
            by_id,
            updated_at,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector length fixed by the first insertion, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// RFC 3339 time of the last committed write.
    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<IndexedRecord>> {
        self.by_id.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<IndexedRecord>> {
        self.entries.iter()
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.entries.iter().map(|e| e.seq + 1).max().unwrap_or(0)
    }

    /// Copy of this snapshot with `staged` entries upserted by id.
    ///
    /// Replacements stay in place, new ids are appended in staged order.
    pub(crate) fn with_upserts(
        &self,
        dimension: usize,
        staged: Vec<IndexedRecord>,
        updated_at: String,
    ) -> Self {
        let mut entries = self.entries.clone();
        let mut by_id = self.by_id.clone();
        for entry in staged {
            match by_id.get(entry.id()) {
                Some(&pos) => entries[pos] = Arc::new(entry),
                None => {
                    by_id.insert(entry.record.id.clone(), entries.len());
                    entries.push(Arc::new(entry));
                }
            }
        }
        Self {
            dimension: Some(dimension),
            entries,
            by_id,
            updated_at: Some(updated_at),
        }
    }

    /// Exact top-k scan by cosine similarity.
    ///
    /// Callers check `top_k > 0` and the query dimension.
    pub(crate) fn top_k(&self, query: &[f32], top_k: usize) -> Vec<RetrievalResult> {
        let query_norm = l2_norm(query);
        let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(top_k + 1);

        for (pos, entry) in self.entries.iter().enumerate() {
            let candidate = Candidate {
                similarity: cosine_similarity(query, query_norm, &entry.vector, entry.norm),
                seq: entry.seq,
                pos,
            };
            if heap.len() < top_k {
                heap.push(Reverse(candidate));
            } else if let Some(Reverse(worst)) = heap.peek()
                && candidate > *worst
            {
                heap.pop();
                heap.push(Reverse(candidate));
            }
        }

        let mut ranked: Vec<Candidate> = heap.into_iter().map(|Reverse(c)| c).collect();
        ranked.sort_by(|a, b| b.cmp(a));
        ranked
            .into_iter()
            .map(|c| self.entries[c.pos].to_result(c.similarity))
            .collect()
    }
}

/// Ranking key: higher similarity wins, then earlier insertion.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    similarity: f32,
    seq: u64,
    pos: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.similarity
            .total_cmp(&other.similarity)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity given precomputed norms. Zero vectors score 0.
fn cosine_similarity(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn entry(id: &str, vector: Vec<f32>, seq: u64) -> IndexedRecord {
        let record = DocumentRecord::new(id.to_string(), format!("Food: {id}"), Metadata::new());
        IndexedRecord::new(record, vector, seq)
    }

    fn snapshot(entries: Vec<IndexedRecord>) -> IndexSnapshot {
        IndexSnapshot::from_entries(Some(2), entries, None)
    }

    fn ids(results: &[RetrievalResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let a = [1.0, 0.0, 0.0];
        let same = cosine_similarity(&a, l2_norm(&a), &a, l2_norm(&a));
        assert!((same - 1.0).abs() < 1e-6);

        let b = [0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, 1.0, &b, 1.0).abs() < 1e-6);

        let c = [-2.0, 0.0, 0.0];
        let opposite = cosine_similarity(&a, 1.0, &c, l2_norm(&c));
        assert!((opposite + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let a = [1.0, 1.0];
        let b = [10.0, 10.0];
        let sim = cosine_similarity(&a, l2_norm(&a), &b, l2_norm(&b));
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let a = [0.0, 0.0];
        let b = [1.0, 0.0];
        assert_eq!(cosine_similarity(&a, 0.0, &b, 1.0), 0.0);
    }

    #[test]
    fn test_top_k_sorted_descending() {
        let snap = snapshot(vec![
            entry("far", vec![0.0, 1.0], 0),
            entry("close", vec![1.0, 0.0], 1),
            entry("medium", vec![0.7, 0.3], 2),
        ]);

        let results = snap.top_k(&[1.0, 0.0], 3);
        assert_eq!(ids(&results), vec!["close", "medium", "far"]);
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_top_k_bounds_results() {
        let snap = snapshot(vec![
            entry("a", vec![1.0, 0.0], 0),
            entry("b", vec![0.9, 0.1], 1),
            entry("c", vec![0.8, 0.2], 2),
        ]);

        assert_eq!(ids(&snap.top_k(&[1.0, 0.0], 2)), vec!["a", "b"]);
        assert_eq!(snap.top_k(&[1.0, 0.0], 100).len(), 3);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let snap = snapshot(vec![
            entry("first", vec![1.0, 0.0], 0),
            entry("second", vec![2.0, 0.0], 1),
            entry("third", vec![3.0, 0.0], 2),
        ]);

        assert_eq!(ids(&snap.top_k(&[1.0, 0.0], 3)), vec!["first", "second", "third"]);
        assert_eq!(ids(&snap.top_k(&[1.0, 0.0], 2)), vec!["first", "second"]);
    }

    #[test]
    fn test_with_upserts_keeps_position_on_replace() {
        let snap = snapshot(vec![
            entry("a", vec![1.0, 0.0], 0),
            entry("b", vec![0.0, 1.0], 1),
        ]);
        let next = snap.with_upserts(
            2,
            vec![entry("a", vec![0.5, 0.5], 0), entry("c", vec![1.0, 1.0], 2)],
            "2026-01-01T00:00:00Z".to_string(),
        );

        assert_eq!(snap.len(), 2);
        assert_eq!(next.len(), 3);
        assert_eq!(next.get("a").unwrap().vector, vec![0.5, 0.5]);
        assert_eq!(next.get("a").unwrap().seq, 0);
        assert_eq!(next.next_seq(), 3);
        let order: Vec<&str> = next.iter().map(|e| e.id()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = IndexSnapshot::default();
        assert!(snap.is_empty());
        assert_eq!(snap.dimension(), None);
        assert_eq!(snap.next_seq(), 0);
        assert!(snap.top_k(&[1.0, 0.0], 3).is_empty());
    }
}
