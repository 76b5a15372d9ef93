//! Idempotent record sinks and the author exclusion list

use std::sync::Mutex;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::SinkError;
use crate::transform::{FlatRecord, RecordKey, short_id};

/// What a single upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Key already stored; the stored row wins
    Skipped,
}

/// A record the sink rejected
#[derive(Debug)]
pub struct RecordFailure {
    pub key: RecordKey,
    pub error: SinkError,
}

/// Counts from loading a batch of records
#[derive(Debug, Default)]
pub struct LoadReport {
    pub inserted: usize,
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
    /// Rows removed by the exclusion purge
    pub purged: usize,
}

impl LoadReport {
    pub fn attempted(&self) -> usize {
        self.inserted + self.skipped + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Store keyed by (work_id, author_id, institution_id) with insert-ignore semantics.
///
/// Implementations must be safe to call from several shard workers at once.
pub trait RecordSink: Send + Sync {
    fn upsert(&self, record: &FlatRecord) -> Result<UpsertOutcome, SinkError>;

    /// Delete every row whose author is excluded. Returns rows removed.
    fn delete_authors(&self, excluded: &ExclusionList) -> Result<usize, SinkError>;

    /// Upsert each record in order. Failures are collected, earlier
    /// successes stay stored.
    fn upsert_all(&self, records: &[FlatRecord]) -> LoadReport {
        let mut report = LoadReport::default();
        for record in records {
            match self.upsert(record) {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Skipped) => report.skipped += 1,
                Err(error) => {
                    log::warn!(
                        "rejected ({}, {}, {}): {error}",
                        record.work_id,
                        record.author_id,
                        record.institution_id
                    );
                    report.failures.push(RecordFailure {
                        key: record.owned_key(),
                        error,
                    });
                }
            }
        }
        report
    }
}

/// Author ids to purge after loading, in short form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    ids: Vec<String>,
}

impl ExclusionList {
    /// Normalise to short ids; blanks and duplicates are dropped
    pub fn new<S: AsRef<str>>(ids: &[S]) -> Self {
        let mut seen = FxHashSet::default();
        let ids = ids
            .iter()
            .map(|id| short_id(id.as_ref().trim()).to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();
        Self { ids }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, author_id: &str) -> bool {
        self.ids.iter().any(|id| id == author_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// In-memory sink for tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<FxHashMap<RecordKey, FlatRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map_or(0, |rows| rows.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, work_id: &str, author_id: &str, institution_id: &str) -> Option<FlatRecord> {
        let key = (
            work_id.to_string(),
            author_id.to_string(),
            institution_id.to_string(),
        );
        self.rows.lock().ok()?.get(&key).cloned()
    }

    /// Stored rows sorted by key
    pub fn snapshot(&self) -> Vec<FlatRecord> {
        let Ok(rows) = self.rows.lock() else {
            return Vec::new();
        };
        let mut out: Vec<FlatRecord> = rows.values().cloned().collect();
        out.sort_by(|a, b| a.key().cmp(&b.key()));
        out
    }
}

impl RecordSink for MemorySink {
    fn upsert(&self, record: &FlatRecord) -> Result<UpsertOutcome, SinkError> {
        let mut rows = self.rows.lock().map_err(|_| SinkError::Poisoned)?;
        match rows.entry(record.owned_key()) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(UpsertOutcome::Skipped),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    fn delete_authors(&self, excluded: &ExclusionList) -> Result<usize, SinkError> {
        if excluded.is_empty() {
            return Ok(0);
        }
        let mut rows = self.rows.lock().map_err(|_| SinkError::Poisoned)?;
        let before = rows.len();
        rows.retain(|(_, author, _), _| !excluded.contains(author));
        Ok(before - rows.len())
    }
}
