//! Case records and priority levels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Metadata;

/// Case priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Critical: watchlist match with high confidence.
    P0,
    /// Watchlist match with moderate confidence.
    P1,
    /// No match, or match with low confidence.
    P2,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status assigned to freshly created cases.
pub const STATUS_OPEN: &str = "open";

fn default_status() -> String {
    STATUS_OPEN.to_string()
}

/// Investigator-facing case ticket. Persisted as one line of the case log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseRecord {
    pub case_id: String,
    pub priority: Priority,
    pub summary: String,

    /// Where the evidence packet for this case was stored.
    pub evidence_path: String,

    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year_range: String,

    #[serde(default)]
    pub plate_number: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default)]
    pub metadata: Metadata,
}

/// Caller-supplied fields for a new case; identifier and timestamps are assigned on creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCase {
    pub summary: String,
    pub priority: Priority,
    pub evidence_path: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year_range: String,
    pub plate_number: Option<String>,
    pub location: Option<String>,
}

impl CaseRecord {
    /// Materialize a new open case under `case_id`.
    pub fn open(case_id: String, new_case: NewCase) -> Self {
        Self {
            case_id,
            priority: new_case.priority,
            summary: new_case.summary,
            evidence_path: new_case.evidence_path,
            vehicle_make: new_case.vehicle_make,
            vehicle_model: new_case.vehicle_model,
            vehicle_year_range: new_case.vehicle_year_range,
            plate_number: new_case.plate_number,
            location: new_case.location,
            created_at: Utc::now(),
            status: default_status(),
            metadata: Metadata::new(),
        }
    }
}
