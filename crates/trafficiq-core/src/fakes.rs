//! In-memory fakes for the storage traits (testing only)
//!
//! `MemoryCaseStore` and `MemoryEvidenceStore` satisfy the trait contracts
//! without touching the filesystem or network.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::cases::{tail, CaseStore};
use crate::domain::{CaseRecord, Result, TrafficError};
use crate::evidence::EvidenceStore;

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryCaseStore
// ---------------------------------------------------------------------------

/// Case log held in a `Vec`, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryCaseStore {
    records: Mutex<Vec<CaseRecord>>,
    fail_writes: bool,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `put` always fails with a storage error.
    pub fn failing() -> Self {
        Self {
            records: Mutex::default(),
            fail_writes: true,
        }
    }

    pub fn len(&self) -> usize {
        guard(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn put(&self, record: &CaseRecord) -> Result<()> {
        if self.fail_writes {
            return Err(TrafficError::Storage("case store unavailable".to_string()));
        }
        guard(&self.records).push(record.clone());
        Ok(())
    }

    async fn get(&self, case_id: &str) -> Result<Option<CaseRecord>> {
        Ok(guard(&self.records)
            .iter()
            .find(|r| r.case_id == case_id)
            .cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<CaseRecord>> {
        Ok(tail(guard(&self.records).clone(), limit))
    }
}

// ---------------------------------------------------------------------------
// MemoryEvidenceStore
// ---------------------------------------------------------------------------

/// Evidence documents kept as `(name, bytes)` pairs.
#[derive(Debug, Default)]
pub struct MemoryEvidenceStore {
    documents: Mutex<Vec<(String, Vec<u8>)>>,
    fail_writes: bool,
}

impl MemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `put` always fails with a storage error.
    pub fn failing() -> Self {
        Self {
            documents: Mutex::default(),
            fail_writes: true,
        }
    }

    /// Snapshot of every document written so far.
    pub fn documents(&self) -> Vec<(String, Vec<u8>)> {
        guard(&self.documents).clone()
    }
}

#[async_trait]
impl EvidenceStore for MemoryEvidenceStore {
    async fn put(&self, name: &str, body: &[u8]) -> Result<String> {
        if self.fail_writes {
            return Err(TrafficError::Storage("evidence store unavailable".to_string()));
        }
        guard(&self.documents).push((name.to_string(), body.to_vec()));
        Ok(format!("memory://evidence/{name}"))
    }

    fn is_local(&self) -> bool {
        false
    }
}
