//! Pipeline orchestrator.
//!
//! One run is a fixed, strictly sequential chain:
//! predict -> (OCR fallback) -> watchlist -> priority -> evidence -> case.
//! Every stage appends step markers to the run's trace. A failing stage
//! aborts the run with a [`PipelineError`] holding the trace so far.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, Instrument};

use crate::cases::CaseRecorder;
use crate::config::Settings;
use crate::domain::{
    AgentResult, AgentRunRequest, Metadata, NewCase, Priority, TrafficError, VehiclePrediction,
    WatchlistMatch,
};
use crate::evidence::{EvidenceDraft, EvidenceRecorder};
use crate::hashing::generate_id;
use crate::metrics::METRICS;
use crate::obs;
use crate::policy::PolicyConfig;
use crate::tools::{
    predictor_from_settings, MockPlateReader, MockWatchlist, PlateReader, VehiclePredictor,
    WatchlistClient, WatchlistQuery,
};

/// Pipeline stage that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    VehiclePrediction,
    Ocr,
    WatchlistLookup,
    Evidence,
    CaseCreation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::VehiclePrediction => "vehicle_prediction",
            Stage::Ocr => "ocr",
            Stage::WatchlistLookup => "bolo_lookup",
            Stage::Evidence => "evidence_packet",
            Stage::CaseCreation => "case_creation",
        }
    }

    /// Step marker recorded when this stage fails.
    pub fn failed_marker(&self) -> String {
        format!("{}_failed", self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run aborted at `stage`; `steps` ends with the stage's `_failed` marker.
#[derive(Debug, thiserror::Error)]
#[error("pipeline failed at {stage}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub steps: Vec<String>,
    pub source: TrafficError,
}

/// Ordered step markers for one run.
struct Trace<'a> {
    run_id: &'a str,
    steps: Vec<String>,
}

impl<'a> Trace<'a> {
    fn new(run_id: &'a str) -> Self {
        Self {
            run_id,
            steps: Vec::with_capacity(12),
        }
    }

    fn mark(&mut self, step: &str) {
        self.steps.push(step.to_string());
        obs::emit_stage(self.run_id, step, self.steps.len());
    }

    fn fail(&mut self, stage: Stage, source: TrafficError) -> PipelineError {
        self.mark(&stage.failed_marker());
        obs::emit_pipeline_failed(self.run_id, stage.as_str(), &source);
        METRICS.inc_runs_failed();
        PipelineError {
            stage,
            steps: std::mem::take(&mut self.steps),
            source,
        }
    }
}

/// `OCR fallback used: <bool>, BOLO match: <bool>`
pub fn evidence_notes(ocr_used: bool, is_match: bool) -> String {
    format!("OCR fallback used: {ocr_used}, BOLO match: {is_match}")
}

/// Investigator-facing one-paragraph case summary.
pub fn case_summary(
    prediction: &VehiclePrediction,
    bolo: &WatchlistMatch,
    ocr_used: bool,
    priority: Priority,
) -> String {
    format!(
        "Vehicle ID: {} {} ({}) - {} {}. Confidence: {:.1}%. BOLO Match: {} ({}). OCR used: {}. Priority: {}.",
        prediction.make,
        prediction.model,
        prediction.year_range,
        prediction.color,
        prediction.body_type,
        prediction.confidence * 100.0,
        bolo.is_match,
        bolo.reason,
        ocr_used,
        priority,
    )
}

/// Sequences the pipeline stages for each request.
#[derive(Clone)]
pub struct TrafficAgent {
    predictor: Arc<dyn VehiclePredictor>,
    plate_reader: Arc<dyn PlateReader>,
    watchlist: Arc<dyn WatchlistClient>,
    evidence: EvidenceRecorder,
    cases: CaseRecorder,
    policy: PolicyConfig,
}

impl TrafficAgent {
    pub fn new(
        predictor: Arc<dyn VehiclePredictor>,
        plate_reader: Arc<dyn PlateReader>,
        watchlist: Arc<dyn WatchlistClient>,
        evidence: EvidenceRecorder,
        cases: CaseRecorder,
    ) -> Self {
        Self {
            predictor,
            plate_reader,
            watchlist,
            evidence,
            cases,
            policy: PolicyConfig::default(),
        }
    }

    /// Wire every component from `settings`. Configuration errors surface here.
    pub fn from_settings(settings: &Settings) -> crate::domain::Result<Self> {
        let agent = Self::new(
            predictor_from_settings(settings)?,
            Arc::new(MockPlateReader::new()),
            Arc::new(MockWatchlist::default()),
            EvidenceRecorder::from_settings(settings)?,
            CaseRecorder::from_settings(settings)?,
        )
        .with_policy(settings.policy.clone());
        info!(
            environment = %settings.environment,
            ocr_skip = agent.policy.min_vehicle_confidence_for_skip_ocr,
            p0 = agent.policy.p0_min_confidence,
            p1 = agent.policy.p1_min_confidence,
            "traffic agent initialized"
        );
        Ok(agent)
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn predictor(&self) -> &Arc<dyn VehiclePredictor> {
        &self.predictor
    }

    pub fn cases(&self) -> &CaseRecorder {
        &self.cases
    }

    /// Run the full pipeline for one image.
    pub async fn run(&self, request: AgentRunRequest) -> Result<AgentResult, PipelineError> {
        let run_id = generate_id("RUN");
        let span = obs::run_span(&run_id, &request.image_uri);
        self.execute(&run_id, request).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: &str,
        request: AgentRunRequest,
    ) -> Result<AgentResult, PipelineError> {
        let started = Instant::now();
        let AgentRunRequest {
            image_uri,
            location,
            timestamp,
        } = request;
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        obs::emit_pipeline_started(run_id, &image_uri, location.as_deref());

        let mut trace = Trace::new(run_id);

        // 1. Vehicle prediction
        trace.mark("vehicle_prediction_request");
        debug!("requesting vehicle prediction");
        let prediction = self
            .predictor
            .predict_vehicle(&image_uri)
            .await
            .map_err(|e| trace.fail(Stage::VehiclePrediction, e))?;
        trace.mark("vehicle_prediction_received");
        info!(
            make = %prediction.make,
            model = %prediction.model,
            confidence = prediction.confidence,
            condition = %prediction.image_condition,
            "vehicle prediction"
        );

        // 2. Conditional OCR fallback
        let needs_ocr = self
            .policy
            .should_use_ocr_fallback(prediction.confidence, prediction.image_condition.as_str());
        let plate_result = if needs_ocr {
            trace.mark("ocr_fallback_triggered");
            METRICS.inc_ocr_fallbacks();
            debug!(
                confidence = prediction.confidence,
                condition = %prediction.image_condition,
                "OCR fallback triggered"
            );
            let plate = self
                .plate_reader
                .extract_plate(&image_uri)
                .await
                .map_err(|e| trace.fail(Stage::Ocr, e))?;
            trace.mark("ocr_plate_extracted");
            info!(plate = %plate.plate_number, confidence = plate.confidence, "plate extracted");
            Some(plate)
        } else {
            trace.mark("ocr_skipped");
            debug!("OCR skipped");
            None
        };
        let ocr_fallback_used = plate_result.is_some();

        // 3. Watchlist lookup
        trace.mark("bolo_lookup_started");
        let query =
            WatchlistQuery::from_prediction(&prediction, plate_result.as_ref(), location.as_deref());
        let bolo = self
            .watchlist
            .lookup(&query)
            .await
            .map_err(|e| trace.fail(Stage::WatchlistLookup, e))?;
        trace.mark("bolo_lookup_completed");
        if bolo.is_match {
            METRICS.inc_watchlist_hits();
        }
        info!(is_match = bolo.is_match, reason = %bolo.reason, "watchlist lookup");

        // 4. Priority
        trace.mark("priority_assignment");
        let priority = self
            .policy
            .assign_priority(bolo.is_match, prediction.confidence);
        info!(priority = %priority, "priority assigned");

        // 5. Evidence packet
        trace.mark("evidence_packet_building");
        let packet = self
            .evidence
            .build(EvidenceDraft {
                image_uri: image_uri.clone(),
                vehicle_prediction: prediction.clone(),
                plate_result: plate_result.clone(),
                bolo_match: Some(bolo.clone()),
                location: location.clone(),
                notes: evidence_notes(ocr_fallback_used, bolo.is_match),
            })
            .await
            .map_err(|e| trace.fail(Stage::Evidence, e))?;
        trace.mark("evidence_packet_created");

        // 6. Case
        trace.mark("case_creation");
        let new_case = NewCase {
            summary: case_summary(&prediction, &bolo, ocr_fallback_used, priority),
            priority,
            evidence_path: packet.evidence_path.clone(),
            vehicle_make: prediction.make.clone(),
            vehicle_model: prediction.model.clone(),
            vehicle_year_range: prediction.year_range.clone(),
            plate_number: plate_result.as_ref().map(|p| p.plate_number.clone()),
            location: location.clone(),
        };
        let case_record = self
            .cases
            .create_case(new_case)
            .await
            .map_err(|e| trace.fail(Stage::CaseCreation, e))?;
        trace.mark("case_created");
        METRICS.inc_cases_created();

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let steps = std::mem::take(&mut trace.steps);

        let mut metadata = Metadata::new();
        metadata.insert("model_version".to_string(), json!(prediction.model_version()));
        metadata.insert("steps_count".to_string(), json!(steps.len()));
        metadata.insert("run_id".to_string(), json!(run_id));
        metadata.insert("evidence_packet_id".to_string(), json!(packet.packet_id));

        METRICS.inc_runs_completed();
        obs::emit_pipeline_finished(
            run_id,
            elapsed_ms,
            steps.len(),
            priority.as_str(),
            &case_record.case_id,
        );

        Ok(AgentResult {
            image_uri,
            vehicle_prediction: prediction,
            ocr_fallback_used,
            plate_result,
            bolo_match: Some(bolo),
            priority,
            case_record: Some(case_record),
            processing_steps: steps,
            total_processing_time_ms: elapsed_ms,
            location,
            timestamp,
            metadata,
        })
    }
}
