//! Capability interfaces for the pipeline's external collaborators.
//!
//! Each stage talks to a trait object so the deterministic mocks and the
//! remote clients are interchangeable. Backends are chosen once, from
//! [`Settings`], when the agent is constructed.

pub mod ocr;
pub mod vehicle;
pub mod watchlist;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Settings;
use crate::domain::{PlateResult, Result, VehiclePrediction, WatchlistMatch};

pub use ocr::MockPlateReader;
pub use vehicle::{EndpointPredictor, MockVehiclePredictor};
pub use watchlist::{MockWatchlist, WatchlistRules};

/// Predicts vehicle attributes for an image reference.
#[async_trait]
pub trait VehiclePredictor: Send + Sync {
    async fn predict_vehicle(&self, image_uri: &str) -> Result<VehiclePrediction>;
}

/// Extracts a license plate from an image reference.
#[async_trait]
pub trait PlateReader: Send + Sync {
    async fn extract_plate(&self, image_uri: &str) -> Result<PlateResult>;
}

/// Vehicle attributes submitted to a watchlist lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchlistQuery {
    pub make: String,
    pub model: String,
    pub year_range: String,
    pub plate: Option<String>,
    pub location: Option<String>,
}

impl WatchlistQuery {
    pub fn from_prediction(
        prediction: &VehiclePrediction,
        plate: Option<&PlateResult>,
        location: Option<&str>,
    ) -> Self {
        Self {
            make: prediction.make.clone(),
            model: prediction.model.clone(),
            year_range: prediction.year_range.clone(),
            plate: plate.map(|p| p.plate_number.clone()),
            location: location.map(str::to_string),
        }
    }
}

/// Checks a vehicle against a BOLO watchlist.
#[async_trait]
pub trait WatchlistClient: Send + Sync {
    async fn lookup(&self, query: &WatchlistQuery) -> Result<WatchlistMatch>;
}

/// Build the vehicle predictor selected by `settings`.
pub fn predictor_from_settings(settings: &Settings) -> Result<Arc<dyn VehiclePredictor>> {
    if settings.use_vertex {
        let predictor = EndpointPredictor::from_settings(settings)?;
        tracing::info!(endpoint = %predictor.endpoint_url(), "vehicle predictor in REMOTE mode");
        Ok(Arc::new(predictor))
    } else {
        tracing::info!("vehicle predictor in MOCK mode");
        Ok(Arc::new(MockVehiclePredictor::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_from_prediction_copies_fields() {
        let prediction = VehiclePrediction {
            image_uri: "a.jpg".to_string(),
            make: "Tesla".to_string(),
            model: "Model 3".to_string(),
            year_range: "2022-2023".to_string(),
            color: "White".to_string(),
            body_type: "sedan".to_string(),
            confidence: 0.9,
            image_condition: Default::default(),
            metadata: Default::default(),
            timestamp: chrono::Utc::now(),
        };
        let query = WatchlistQuery::from_prediction(&prediction, None, Some("Exit 9"));
        assert_eq!(query.make, "Tesla");
        assert_eq!(query.model, "Model 3");
        assert!(query.plate.is_none());
        assert_eq!(query.location.as_deref(), Some("Exit 9"));
    }

    #[test]
    fn remote_predictor_requires_endpoint() {
        let settings = Settings {
            use_vertex: true,
            ..Settings::default()
        };
        assert!(predictor_from_settings(&settings).is_err());
    }

    #[tokio::test]
    async fn mock_predictor_selected_by_default() {
        let predictor = predictor_from_settings(&Settings::default()).unwrap();
        let prediction = predictor.predict_vehicle("gs://b/x.jpg").await.unwrap();
        assert_eq!(
            prediction.metadata.get("prediction_type").and_then(|v| v.as_str()),
            Some("mock")
        );
    }
}
