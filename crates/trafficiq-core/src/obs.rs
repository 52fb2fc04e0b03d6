//! Structured observability hooks for pipeline runs.
//!
//! - [`run_span`] builds the span a run executes in; attach it with
//!   `tracing::Instrument` so it follows the future across awaits.
//! - `emit_*` functions log the named lifecycle events.

use tracing::{info, info_span, warn, Span};

/// Span tagging every record of one pipeline run.
pub fn run_span(run_id: &str, image_uri: &str) -> Span {
    info_span!("trafficiq.run", run_id = %run_id, image_uri = %image_uri)
}

/// Emit event: pipeline started.
pub fn emit_pipeline_started(run_id: &str, image_uri: &str, location: Option<&str>) {
    info!(
        event = "pipeline.started",
        run_id = %run_id,
        image_uri = %image_uri,
        location = location.unwrap_or(""),
    );
}

/// Emit event: a step marker was recorded.
pub fn emit_stage(run_id: &str, step: &str, seq: usize) {
    info!(event = "pipeline.stage", run_id = %run_id, step = %step, seq = seq);
}

/// Emit event: pipeline finished with its outcome.
pub fn emit_pipeline_finished(
    run_id: &str,
    duration_ms: f64,
    steps: usize,
    priority: &str,
    case_id: &str,
) {
    info!(
        event = "pipeline.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        steps = steps,
        priority = %priority,
        case_id = %case_id,
    );
}

/// Emit event: pipeline aborted at `stage` (warning level).
pub fn emit_pipeline_failed(run_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "pipeline.failed", run_id = %run_id, stage = %stage, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_span_carries_name() {
        let span = run_span("run-1", "gs://b/a.jpg");
        if let Some(meta) = span.metadata() {
            assert_eq!(meta.name(), "trafficiq.run");
        }
    }
}
