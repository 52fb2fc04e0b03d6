//! Evidence packets: build, serialize and persist one audit document per run.

pub mod fs;
pub mod gcs;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use crate::config::Settings;
use crate::domain::evidence::EvidenceDocument;
use crate::domain::{
    EvidencePacket, Metadata, PlateResult, Result, VehiclePrediction, WatchlistMatch,
};
use crate::hashing::generate_id;

pub use fs::FsEvidenceStore;
pub use gcs::GcsEvidenceStore;

/// Destination for serialized evidence documents.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Write `body` under `name` and return where it landed. One attempt, no retry.
    async fn put(&self, name: &str, body: &[u8]) -> Result<String>;

    /// Whether documents land on the local filesystem.
    fn is_local(&self) -> bool;
}

/// Inputs captured in an evidence packet.
#[derive(Debug, Clone)]
pub struct EvidenceDraft {
    pub image_uri: String,
    pub vehicle_prediction: VehiclePrediction,
    pub plate_result: Option<PlateResult>,
    pub bolo_match: Option<WatchlistMatch>,
    pub location: Option<String>,
    pub notes: String,
}

/// `<packet_id>_<YYYYMMDD_HHMMSS>.json`
pub fn evidence_file_name(packet_id: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.json", packet_id, at.format("%Y%m%d_%H%M%S"))
}

/// Builds evidence packets and writes them through an [`EvidenceStore`].
#[derive(Clone)]
pub struct EvidenceRecorder {
    store: Arc<dyn EvidenceStore>,
}

impl EvidenceRecorder {
    pub fn new(store: Arc<dyn EvidenceStore>) -> Self {
        Self { store }
    }

    /// Object store when `use_gcs` is set, otherwise the artifacts directory.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store: Arc<dyn EvidenceStore> = if settings.use_gcs {
            let store = GcsEvidenceStore::from_settings(settings)?;
            info!(bucket = %store.bucket(), "evidence store: object storage");
            Arc::new(store)
        } else {
            let store = FsEvidenceStore::new(settings.ensure_artifacts_dir()?)?;
            info!(dir = %store.root().display(), "evidence store: local filesystem");
            Arc::new(store)
        };
        Ok(Self::new(store))
    }

    /// Assign a packet id, persist the snapshot and return the packet.
    pub async fn build(&self, draft: EvidenceDraft) -> Result<EvidencePacket> {
        let packet_id = generate_id("EV");
        let timestamp = Utc::now();

        let document = EvidenceDocument {
            packet_id: &packet_id,
            timestamp,
            image_uri: &draft.image_uri,
            location: draft.location.as_deref(),
            notes: &draft.notes,
            vehicle_prediction: &draft.vehicle_prediction,
            plate_result: draft.plate_result.as_ref(),
            bolo_match: draft.bolo_match.as_ref(),
        };
        let body = serde_json::to_vec_pretty(&document)?;

        let name = evidence_file_name(&packet_id, timestamp);
        let evidence_path = self.store.put(&name, &body).await?;

        let mut metadata = Metadata::new();
        metadata.insert("saved_at".to_string(), json!(timestamp.to_rfc3339()));
        metadata.insert("saved_to_local".to_string(), json!(self.store.is_local()));

        info!(packet_id = %packet_id, path = %evidence_path, "evidence packet created");

        Ok(EvidencePacket {
            packet_id,
            image_uri: draft.image_uri,
            vehicle_prediction: draft.vehicle_prediction,
            plate_result: draft.plate_result,
            bolo_match: draft.bolo_match,
            location: draft.location,
            timestamp,
            notes: draft.notes,
            evidence_path,
            metadata,
        })
    }
}
