//! Evidence packets: immutable audit snapshots of a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Metadata, PlateResult, VehiclePrediction, WatchlistMatch};

/// Snapshot of all inputs and outputs of one run, written once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidencePacket {
    pub packet_id: String,
    pub image_uri: String,
    pub vehicle_prediction: VehiclePrediction,

    #[serde(default)]
    pub plate_result: Option<PlateResult>,

    #[serde(default)]
    pub bolo_match: Option<WatchlistMatch>,

    #[serde(default)]
    pub location: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub notes: String,

    /// Local path or object-store URI of the persisted document. Never empty.
    pub evidence_path: String,

    #[serde(default)]
    pub metadata: Metadata,
}

/// The document body written to evidence storage.
///
/// Borrowed view so the packet is serialized without cloning its parts.
#[derive(Debug, Serialize)]
pub(crate) struct EvidenceDocument<'a> {
    pub packet_id: &'a str,
    pub timestamp: DateTime<Utc>,
    pub image_uri: &'a str,
    pub location: Option<&'a str>,
    pub notes: &'a str,
    pub vehicle_prediction: &'a VehiclePrediction,
    pub plate_result: Option<&'a PlateResult>,
    pub bolo_match: Option<&'a WatchlistMatch>,
}
