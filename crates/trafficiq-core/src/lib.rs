//! TrafficIQ Core Library
//!
//! Vehicle identification pipeline: prediction, plate OCR fallback,
//! watchlist lookup, prioritisation, evidence capture and case creation.

pub mod agent;
pub mod cases;
pub mod config;
pub mod domain;
pub mod eval;
pub mod evidence;
pub mod fakes;
pub mod hashing;
#[cfg(test)]
mod loopback;
pub mod metrics;
pub mod obs;
pub mod policy;
pub mod telemetry;
pub mod tools;

pub use agent::{case_summary, evidence_notes, PipelineError, Stage, TrafficAgent};
pub use cases::{CaseRecorder, CaseStore, JsonlCaseStore, ListingMode, DEFAULT_LIST_LIMIT};
pub use config::Settings;
pub use domain::{
    AgentResult, AgentRunRequest, AnalyzeRequest, CaseRecord, EvidencePacket, HealthResponse,
    ImageCondition, Metadata, NewCase, PlateResult, Priority, Result, TrafficError,
    VehiclePrediction, WatchlistMatch,
};
pub use eval::{EvalMetrics, EvalOutcome, Evaluator};
pub use evidence::{
    EvidenceDraft, EvidenceRecorder, EvidenceStore, FsEvidenceStore, GcsEvidenceStore,
};
pub use policy::PolicyConfig;
pub use tools::{
    predictor_from_settings, EndpointPredictor, MockPlateReader, MockVehiclePredictor,
    MockWatchlist, PlateReader, VehiclePredictor, WatchlistClient, WatchlistQuery, WatchlistRules,
};

pub use metrics::METRICS;
pub use obs::{
    emit_pipeline_failed, emit_pipeline_finished, emit_pipeline_started, emit_stage, run_span,
};
pub use telemetry::{init_tracing, init_tracing_from_settings};

/// TrafficIQ version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
