//! Request and result types for the orchestration pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CaseRecord, Metadata, PlateResult, Priority, VehiclePrediction, WatchlistMatch};

/// Request for a single-shot vehicle prediction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyzeRequest {
    pub image_uri: String,
}

/// Request for a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRunRequest {
    pub image_uri: String,

    #[serde(default)]
    pub location: Option<String>,

    /// Capture time of the image; defaults to the time the run starts.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AgentRunRequest {
    pub fn new(image_uri: impl Into<String>) -> Self {
        Self {
            image_uri: image_uri.into(),
            location: None,
            timestamp: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Aggregate output of one pipeline run. Not persisted itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResult {
    pub image_uri: String,
    pub vehicle_prediction: VehiclePrediction,
    pub ocr_fallback_used: bool,

    #[serde(default)]
    pub plate_result: Option<PlateResult>,

    #[serde(default)]
    pub bolo_match: Option<WatchlistMatch>,

    pub priority: Priority,

    #[serde(default)]
    pub case_record: Option<CaseRecord>,

    /// Ordered step markers recorded while the run progressed.
    #[serde(default)]
    pub processing_steps: Vec<String>,

    pub total_processing_time_ms: f64,

    #[serde(default)]
    pub location: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub metadata: Metadata,
}

/// Health probe response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
}
