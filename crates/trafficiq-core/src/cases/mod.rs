//! Case management: an append-only case log behind a small store interface.

pub mod jsonl;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Settings;
use crate::domain::{CaseRecord, NewCase, Result, TrafficError};
use crate::hashing::generate_id;

pub use jsonl::JsonlCaseStore;

/// Default number of records returned by a listing.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// How a listing treats case-log lines that fail to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingMode {
    /// Skip the line and log a warning.
    #[default]
    Lenient,
    /// Abort the listing with [`TrafficError::CorruptRecord`].
    Strict,
}

impl fmt::Display for ListingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingMode::Lenient => f.write_str("lenient"),
            ListingMode::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for ListingMode {
    type Err = TrafficError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(ListingMode::Lenient),
            "strict" => Ok(ListingMode::Strict),
            other => Err(TrafficError::Config(format!(
                "unknown case listing mode: {other}"
            ))),
        }
    }
}

/// Persistence for case records.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Append a record.
    async fn put(&self, record: &CaseRecord) -> Result<()>;

    /// First record with `case_id`, or `None`.
    async fn get(&self, case_id: &str) -> Result<Option<CaseRecord>>;

    /// The last `limit` records, oldest first.
    async fn list(&self, limit: usize) -> Result<Vec<CaseRecord>>;
}

/// Creates and reads cases through a [`CaseStore`].
#[derive(Clone)]
pub struct CaseRecorder {
    store: Arc<dyn CaseStore>,
}

impl CaseRecorder {
    pub fn new(store: Arc<dyn CaseStore>) -> Self {
        Self { store }
    }

    /// Case log under the configured artifacts directory.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let dir = settings.ensure_artifacts_dir()?;
        let store = JsonlCaseStore::new(dir, settings.case_listing_mode);
        info!(path = %store.path().display(), mode = %settings.case_listing_mode, "case store ready");
        Ok(Self::new(Arc::new(store)))
    }

    /// Assign a fresh identifier, mark the case open and append it.
    pub async fn create_case(&self, new_case: NewCase) -> Result<CaseRecord> {
        let record = CaseRecord::open(generate_id("CASE"), new_case);
        self.store.put(&record).await?;
        info!(case_id = %record.case_id, priority = %record.priority, "case created");
        Ok(record)
    }

    pub async fn get_case(&self, case_id: &str) -> Result<Option<CaseRecord>> {
        self.store.get(case_id).await
    }

    pub async fn list_cases(&self, limit: usize) -> Result<Vec<CaseRecord>> {
        self.store.list(limit).await
    }
}

/// Keep the last `limit` items of `records`, in order.
pub(crate) fn tail<T>(mut records: Vec<T>, limit: usize) -> Vec<T> {
    if records.len() > limit {
        records.drain(..records.len() - limit);
    }
    records
}
