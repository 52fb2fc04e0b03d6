//! Offline evaluation of the vehicle predictor against a labelled dataset.
//!
//! The dataset is JSONL with one `{image_uri, true_make, true_model,
//! true_year_range}` object per line. Make is the scored label.

pub mod metrics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::domain::{Result, TrafficError};
use crate::tools::{predictor_from_settings, VehiclePredictor};

pub use metrics::{ConfusionMatrix, EvalMetrics};

/// Default report file name inside the artifacts directory.
pub const REPORT_FILE: &str = "eval_report.md";

/// Rows shown in the sample-predictions table.
const SAMPLE_ROWS: usize = 10;

/// One labelled dataset entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSample {
    pub image_uri: String,
    pub true_make: String,
    #[serde(default)]
    pub true_model: Option<String>,
    #[serde(default)]
    pub true_year_range: Option<String>,
}

/// Predictor output paired with its labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalPrediction {
    pub image_uri: String,
    pub true_make: String,
    pub pred_make: String,
    pub pred_confidence: f64,
    pub true_model: Option<String>,
    pub pred_model: String,
    pub true_year_range: Option<String>,
    pub pred_year_range: String,
}

impl EvalPrediction {
    pub fn is_correct(&self) -> bool {
        self.true_make == self.pred_make
    }
}

/// Result of an evaluation run.
#[derive(Debug, Clone, Serialize)]
pub struct EvalOutcome {
    pub samples: usize,
    pub predictions: Vec<EvalPrediction>,
    pub metrics: EvalMetrics,
    pub report_path: Option<PathBuf>,
}

/// Parse a JSONL dataset. Blank lines are ignored; a malformed line is an error.
pub fn parse_dataset(raw: &str) -> Result<Vec<EvalSample>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| TrafficError::CorruptRecord {
                line: i + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

pub async fn load_dataset(path: &Path) -> Result<Vec<EvalSample>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let samples = parse_dataset(&raw)?;
    info!(path = %path.display(), samples = samples.len(), "dataset loaded");
    Ok(samples)
}

/// Runs a predictor over a dataset and reports metrics.
pub struct Evaluator {
    predictor: Arc<dyn VehiclePredictor>,
    artifacts_dir: PathBuf,
}

impl Evaluator {
    pub fn new(predictor: Arc<dyn VehiclePredictor>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            predictor,
            artifacts_dir: artifacts_dir.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            predictor_from_settings(settings)?,
            settings.ensure_artifacts_dir()?,
        ))
    }

    pub fn default_report_path(&self) -> PathBuf {
        self.artifacts_dir.join(REPORT_FILE)
    }

    /// Predict every sample; failed predictions are logged and left out.
    pub async fn predict_all(&self, samples: &[EvalSample]) -> Vec<EvalPrediction> {
        let mut predictions = Vec::with_capacity(samples.len());
        for (i, sample) in samples.iter().enumerate() {
            match self.predictor.predict_vehicle(&sample.image_uri).await {
                Ok(pred) => predictions.push(EvalPrediction {
                    image_uri: sample.image_uri.clone(),
                    true_make: sample.true_make.clone(),
                    pred_make: pred.make,
                    pred_confidence: pred.confidence,
                    true_model: sample.true_model.clone(),
                    pred_model: pred.model,
                    true_year_range: sample.true_year_range.clone(),
                    pred_year_range: pred.year_range,
                }),
                Err(e) => {
                    warn!(image_uri = %sample.image_uri, error = %e, "prediction failed, sample skipped");
                }
            }
            if (i + 1) % 5 == 0 {
                debug!(done = i + 1, total = samples.len(), "evaluation progress");
            }
        }
        info!(
            succeeded = predictions.len(),
            total = samples.len(),
            "predictions complete"
        );
        predictions
    }

    /// Evaluate the dataset at `dataset`, writing the report to `output`
    /// (or the artifacts directory). An empty dataset writes no report.
    pub async fn run(&self, dataset: &Path, output: Option<&Path>) -> Result<EvalOutcome> {
        let samples = load_dataset(dataset).await?;
        if samples.is_empty() {
            warn!(path = %dataset.display(), "no samples to evaluate");
            return Ok(EvalOutcome {
                samples: 0,
                predictions: Vec::new(),
                metrics: EvalMetrics::default(),
                report_path: None,
            });
        }

        let predictions = self.predict_all(&samples).await;
        let metrics = compute_metrics(&predictions);
        info!(
            accuracy = metrics.accuracy,
            ece = metrics.ece_confidence,
            "metrics calculated"
        );

        let report = render_report(samples.len(), &predictions, &metrics);
        let report_path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_report_path());
        write_report(&report_path, &report).await?;
        info!(path = %report_path.display(), "evaluation report written");

        Ok(EvalOutcome {
            samples: samples.len(),
            predictions,
            metrics,
            report_path: Some(report_path),
        })
    }
}

pub fn compute_metrics(predictions: &[EvalPrediction]) -> EvalMetrics {
    if predictions.is_empty() {
        return EvalMetrics::default();
    }
    let true_makes: Vec<String> = predictions.iter().map(|p| p.true_make.clone()).collect();
    let pred_makes: Vec<String> = predictions.iter().map(|p| p.pred_make.clone()).collect();
    let confidences: Vec<f64> = predictions.iter().map(|p| p.pred_confidence).collect();
    EvalMetrics::compute(&true_makes, &pred_makes, &confidences)
}

/// Last `n` characters of `s`.
fn tail_chars(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) if n > 0 => &s[idx..],
        _ if n == 0 => "",
        _ => s,
    }
}

/// Markdown evaluation report.
pub fn render_report(samples: usize, predictions: &[EvalPrediction], metrics: &EvalMetrics) -> String {
    let now = Utc::now();
    let mut out = String::new();
    out.push_str("# TrafficIQ Evaluation Report\n\n");
    out.push_str(&format!("Generated: {}\n\n", now.to_rfc3339()));

    out.push_str("## Summary\n\n");
    out.push_str(&format!("- Dataset Size: {samples} samples\n"));
    out.push_str(&format!(
        "- Successful Predictions: {}/{}\n",
        predictions.len(),
        samples
    ));
    out.push_str(&format!(
        "- Evaluation Date: {}\n\n",
        now.format("%Y-%m-%d %H:%M:%S")
    ));

    out.push_str("## Overall Metrics\n\n");
    out.push_str(&format!(
        "- **Accuracy**: {:.4} ({:.2}%)\n",
        metrics.accuracy,
        metrics.accuracy * 100.0
    ));
    out.push_str(&format!("- **ECE (Calibration)**: {:.4}\n", metrics.ece_confidence));
    out.push_str(&format!("- **Precision (macro)**: {:.4}\n", metrics.precision_macro));
    out.push_str(&format!("- **Recall (macro)**: {:.4}\n", metrics.recall_macro));
    out.push_str(&format!("- **F1-Score (macro)**: {:.4}\n\n", metrics.f1_macro));

    if !metrics.accuracy_by_class.is_empty() {
        out.push_str("## Per-Class Accuracy (Vehicle Makes)\n\n");
        out.push_str("| Make | Accuracy |\n|------|----------|\n");
        let mut by_class: Vec<(&String, &f64)> = metrics.accuracy_by_class.iter().collect();
        by_class.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (make, acc) in by_class {
            out.push_str(&format!("| {make} | {acc:.4} ({:.2}%) |\n", acc * 100.0));
        }
        out.push('\n');
    }

    if !metrics.confusion.is_empty() {
        out.push_str("## Confusion Matrix (Top Makes)\n\n");
        out.push_str(&metrics.confusion.render_md());
        out.push('\n');
    }

    out.push_str("## Sample Predictions\n\n");
    out.push_str("| Image | True Make | Predicted Make | Confidence |\n");
    out.push_str("|-------|-----------|----------------|------------|\n");
    for p in predictions.iter().take(SAMPLE_ROWS) {
        let mark = if p.is_correct() { "✓" } else { "✗" };
        out.push_str(&format!(
            "| {} | {} | {} | {:.2} {} |\n",
            tail_chars(&p.image_uri, 20),
            p.true_make,
            p.pred_make,
            p.pred_confidence,
            mark
        ));
    }
    out.push('\n');

    out.push_str("## Notes\n\n");
    out.push_str("- Mock predictions are derived from a hash of the image reference and are reproducible\n");
    out.push_str("- ECE (Expected Calibration Error) measures confidence calibration; lower is better\n");
    out
}

pub async fn write_report(path: &Path, report: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, report).await?;
    Ok(())
}
