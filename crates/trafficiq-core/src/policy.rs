//! Decision policy for the pipeline.
//!
//! Two pure functions drive every branch the orchestrator takes:
//! whether to fall back to plate OCR, and which priority a case gets.
//! Thresholds live on [`PolicyConfig`] so they can be tuned per deployment.

use serde::{Deserialize, Serialize};

use crate::domain::Priority;

/// Degraded-capture keywords that force the OCR fallback.
pub const DEGRADED_CONDITIONS: [&str; 4] = ["night", "blur", "rain", "low_res"];

/// Thresholds for OCR fallback and priority assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Vehicle confidence at or above which OCR is skipped on clear images.
    pub min_vehicle_confidence_for_skip_ocr: f64,
    /// Minimum confidence for P0 on a watchlist match.
    pub p0_min_confidence: f64,
    /// Minimum confidence for P1 on a watchlist match.
    pub p1_min_confidence: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            min_vehicle_confidence_for_skip_ocr: 0.70,
            p0_min_confidence: 0.70,
            p1_min_confidence: 0.50,
        }
    }
}

impl PolicyConfig {
    /// Whether plate OCR should run for this prediction.
    ///
    /// True when confidence is below the skip threshold or the condition
    /// mentions any degraded-capture keyword (case-insensitive).
    pub fn should_use_ocr_fallback(&self, vehicle_confidence: f64, image_condition: &str) -> bool {
        if vehicle_confidence < self.min_vehicle_confidence_for_skip_ocr {
            return true;
        }

        let condition = image_condition.to_lowercase();
        DEGRADED_CONDITIONS
            .iter()
            .any(|keyword| condition.contains(keyword))
    }

    /// Assign a case priority from the watchlist outcome and vehicle confidence.
    pub fn assign_priority(&self, watchlist_match: bool, confidence: f64) -> Priority {
        if !watchlist_match {
            return Priority::P2;
        }
        if confidence >= self.p0_min_confidence {
            Priority::P0
        } else if confidence >= self.p1_min_confidence {
            Priority::P1
        } else {
            Priority::P2
        }
    }
}
