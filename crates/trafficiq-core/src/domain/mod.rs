//! Domain models for TrafficIQ.
//!
//! Canonical definitions for the pipeline entities:
//! - `VehiclePrediction`, `PlateResult`, `WatchlistMatch`: per-stage outputs
//! - `EvidencePacket`: immutable audit snapshot of one run
//! - `CaseRecord`: investigator-facing ticket referencing the evidence
//! - `AgentResult`: aggregate returned to callers

pub mod agent;
pub mod case;
pub mod error;
pub mod evidence;
pub mod vehicle;

/// Free-form JSON metadata attached to records.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// Re-export main types and errors
pub use agent::{AgentResult, AgentRunRequest, AnalyzeRequest, HealthResponse};
pub use case::{CaseRecord, NewCase, Priority};
pub use error::{Result, TrafficError};
pub use evidence::EvidencePacket;
pub use vehicle::{ImageCondition, PlateResult, VehiclePrediction, WatchlistMatch};

/// Clamp a score into the closed unit interval.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
