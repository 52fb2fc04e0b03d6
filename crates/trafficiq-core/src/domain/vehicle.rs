//! Per-stage outputs: vehicle attributes, plate reads and watchlist hits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Metadata;

/// Image quality tag derived from the image reference.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImageCondition {
    #[default]
    Clear,
    Night,
    Blur,
    Rain,
    LowRes,
}

impl ImageCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageCondition::Clear => "clear",
            ImageCondition::Night => "night",
            ImageCondition::Blur => "blur",
            ImageCondition::Rain => "rain",
            ImageCondition::LowRes => "low_res",
        }
    }
}

impl std::fmt::Display for ImageCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vehicle attributes predicted for one image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehiclePrediction {
    pub image_uri: String,

    /// Manufacturer (Honda, Toyota, ...).
    pub make: String,

    /// Model name (Civic, Camry, ...).
    pub model: String,

    /// Year range such as `2020-2021`.
    pub year_range: String,

    pub color: String,

    /// Body type (sedan, SUV, truck, ...).
    pub body_type: String,

    /// Prediction confidence in `[0, 1]`.
    pub confidence: f64,

    #[serde(default)]
    pub image_condition: ImageCondition,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl VehiclePrediction {
    /// Model version reported in metadata, if any.
    pub fn model_version(&self) -> Option<&str> {
        self.metadata.get("model_version").and_then(|v| v.as_str())
    }
}

/// License plate read produced by the OCR fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlateResult {
    pub plate_number: String,

    /// OCR confidence in `[0, 1]`.
    pub confidence: f64,

    pub image_uri: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a BOLO (watchlist) lookup.
///
/// Vehicle fields are echoed only when `is_match` is true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchlistMatch {
    pub is_match: bool,

    #[serde(default)]
    pub make: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub year_range: Option<String>,

    #[serde(default)]
    pub plate: Option<String>,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub match_confidence: f64,

    #[serde(default)]
    pub bolo_record_id: Option<String>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl WatchlistMatch {
    /// A negative lookup result with the given reason.
    pub fn no_match(reason: impl Into<String>) -> Self {
        Self {
            is_match: false,
            make: None,
            model: None,
            year_range: None,
            plate: None,
            reason: reason.into(),
            match_confidence: 0.0,
            bolo_record_id: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn image_condition_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(ImageCondition::LowRes).unwrap(),
            json!("low_res")
        );
        let parsed: ImageCondition = serde_json::from_value(json!("night")).unwrap();
        assert_eq!(parsed, ImageCondition::Night);
    }

    #[test]
    fn prediction_defaults_fill_optional_fields() {
        let raw = json!({
            "image_uri": "gs://bucket/a.jpg",
            "make": "Ford",
            "model": "F150",
            "year_range": "2021-2022",
            "color": "Red",
            "body_type": "truck",
            "confidence": 0.8
        });
        let prediction: VehiclePrediction = serde_json::from_value(raw).unwrap();
        assert_eq!(prediction.image_condition, ImageCondition::Clear);
        assert!(prediction.metadata.is_empty());
        assert_eq!(prediction.model_version(), None);
    }

    #[test]
    fn no_match_leaves_vehicle_fields_empty() {
        let m = WatchlistMatch::no_match("no match found");
        assert!(!m.is_match);
        assert!(m.make.is_none());
        assert!(m.plate.is_none());
        assert_eq!(m.match_confidence, 0.0);
        assert_eq!(m.reason, "no match found");
    }
}
