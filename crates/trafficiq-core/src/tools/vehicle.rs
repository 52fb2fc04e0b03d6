//! Vehicle attribute prediction backends.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::VehiclePredictor;
use crate::config::Settings;
use crate::domain::{
    clamp_unit, ImageCondition, Metadata, Result, TrafficError, VehiclePrediction,
};
use crate::hashing::{hash_fraction, pick_index, UriFeatures};

pub const MAKES: [&str; 7] = [
    "Honda",
    "Toyota",
    "Ford",
    "BMW",
    "Tesla",
    "Nissan",
    "Chevrolet",
];
/// Paired by index with [`MAKES`].
pub const MODELS: [&str; 7] = [
    "Civic",
    "Camry",
    "F150",
    "3 Series",
    "Model 3",
    "Altima",
    "Silverado",
];
pub const YEAR_RANGES: [&str; 4] = ["2020-2021", "2021-2022", "2022-2023", "2023-2024"];
pub const COLORS: [&str; 7] = ["Black", "White", "Gray", "Silver", "Red", "Blue", "Green"];
pub const BODY_TYPES: [&str; 5] = ["sedan", "SUV", "truck", "coupe", "wagon"];

pub const MOCK_MODEL_VERSION: &str = "gemma-3n-v1.0";

const NIGHT_OR_BLUR_PENALTY: f64 = 0.7;
const LOW_RES_PENALTY: f64 = 0.85;

/// Condition tag for an image reference. Precedence: night, blur, rain, low_res.
pub fn image_condition(features: &UriFeatures) -> ImageCondition {
    if features.is_night {
        ImageCondition::Night
    } else if features.is_blur {
        ImageCondition::Blur
    } else if features.is_rain {
        ImageCondition::Rain
    } else if features.is_low_res {
        ImageCondition::LowRes
    } else {
        ImageCondition::Clear
    }
}

/// Deterministic predictor: the same image reference always yields the same prediction.
#[derive(Debug, Clone, Default)]
pub struct MockVehiclePredictor;

impl MockVehiclePredictor {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of the mock, exposed for evaluation and tests.
    pub fn predict(&self, image_uri: &str) -> VehiclePrediction {
        let features = UriFeatures::from_uri(image_uri);
        let base = features.hash_value;

        let mut confidence = hash_fraction(&format!("{image_uri}_confidence"));
        if features.is_night || features.is_blur {
            confidence *= NIGHT_OR_BLUR_PENALTY;
        }
        if features.is_low_res {
            confidence *= LOW_RES_PENALTY;
        }

        let vehicle_idx = pick_index(base, MAKES.len());
        let year_idx = pick_index(hash_fraction(&format!("{image_uri}_year")), YEAR_RANGES.len());
        let color_idx = pick_index(hash_fraction(&format!("{image_uri}_color")), COLORS.len());
        let body_idx = pick_index(hash_fraction(&format!("{image_uri}_body")), BODY_TYPES.len());

        let mut metadata = Metadata::new();
        metadata.insert("model_version".to_string(), json!(MOCK_MODEL_VERSION));
        metadata.insert("prediction_type".to_string(), json!("mock"));

        let prediction = VehiclePrediction {
            image_uri: image_uri.to_string(),
            make: MAKES[vehicle_idx].to_string(),
            model: MODELS[vehicle_idx].to_string(),
            year_range: YEAR_RANGES[year_idx].to_string(),
            color: COLORS[color_idx].to_string(),
            body_type: BODY_TYPES[body_idx].to_string(),
            confidence: clamp_unit(confidence.min(1.0)),
            image_condition: image_condition(&features),
            metadata,
            timestamp: Utc::now(),
        };

        debug!(
            image_uri = %image_uri,
            make = %prediction.make,
            model = %prediction.model,
            confidence = prediction.confidence,
            "mock vehicle prediction"
        );
        prediction
    }
}

#[async_trait]
impl VehiclePredictor for MockVehiclePredictor {
    async fn predict_vehicle(&self, image_uri: &str) -> Result<VehiclePrediction> {
        Ok(self.predict(image_uri))
    }
}

/// One entry of the remote endpoint's `predictions` array.
#[derive(Debug, Clone, Deserialize)]
struct RemotePrediction {
    make: String,
    model: String,
    #[serde(default)]
    year_range: String,
    #[serde(default)]
    color: String,
    #[serde(default)]
    body_type: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<RemotePrediction>,
    #[serde(default, rename = "deployedModelId")]
    deployed_model_id: Option<String>,
}

/// Client for a hosted prediction endpoint speaking the `:predict` JSON protocol.
pub struct EndpointPredictor {
    endpoint_url: String,
    model_name: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl EndpointPredictor {
    /// Build the client from settings.
    ///
    /// Fails with a configuration error when the project or endpoint id is missing.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let project = settings
            .gcp_project
            .as_deref()
            .ok_or_else(|| TrafficError::Config("GCP_PROJECT not configured".to_string()))?;
        let endpoint_id = settings
            .vertex_endpoint_id
            .as_deref()
            .ok_or_else(|| TrafficError::Config("VERTEX_ENDPOINT_ID not configured".to_string()))?;

        let region = &settings.gcp_region;
        let endpoint_url = format!(
            "https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/endpoints/{endpoint_id}:predict"
        );

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("trafficiq-core/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint_url,
            model_name: settings.vertex_model_name.clone(),
            token: settings.gcp_access_token.clone(),
            http_client,
        })
    }

    /// Send predictions to another URL, e.g. a regional proxy.
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = url.into();
        self
    }

    /// Use a preconfigured client (proxy, timeouts, TLS roots).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    fn build_prediction(
        &self,
        image_uri: &str,
        response: PredictResponse,
    ) -> Result<VehiclePrediction> {
        let remote = response.predictions.into_iter().next().ok_or_else(|| {
            TrafficError::Remote {
                service: "prediction-endpoint".to_string(),
                status: 200,
                body: "response contained no predictions".to_string(),
            }
        })?;

        let features = UriFeatures::from_uri(image_uri);
        let mut metadata = Metadata::new();
        metadata.insert("model_version".to_string(), json!(self.model_name));
        metadata.insert("prediction_type".to_string(), json!("remote"));
        if let Some(id) = response.deployed_model_id {
            metadata.insert("deployed_model_id".to_string(), json!(id));
        }

        Ok(VehiclePrediction {
            image_uri: image_uri.to_string(),
            make: remote.make,
            model: remote.model,
            year_range: remote.year_range,
            color: remote.color,
            body_type: remote.body_type,
            confidence: clamp_unit(remote.confidence),
            image_condition: image_condition(&features),
            metadata,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl VehiclePredictor for EndpointPredictor {
    async fn predict_vehicle(&self, image_uri: &str) -> Result<VehiclePrediction> {
        debug!(endpoint = %self.endpoint_url, image_uri = %image_uri, "calling prediction endpoint");

        let mut request = self
            .http_client
            .post(&self.endpoint_url)
            .json(&json!({ "instances": [{ "image_uri": image_uri }] }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrafficError::Remote {
                service: "prediction-endpoint".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PredictResponse = response.json().await?;
        self.build_prediction(image_uri, parsed)
    }
}
