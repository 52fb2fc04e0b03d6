//! Application settings.
//!
//! A single [`Settings`] value is built once at startup (usually via
//! [`Settings::from_env`]) and handed to every component constructor.
//! Nothing in the crate reads the environment after that point.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::cases::ListingMode;
use crate::domain::Result;
use crate::policy::PolicyConfig;

/// Runtime configuration for TrafficIQ components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Deployment environment name (development, test, production).
    pub environment: String,
    pub log_level: String,
    pub json_logging: bool,
    pub debug: bool,
    pub api_title: String,
    pub api_version: String,

    /// Use the remote prediction endpoint instead of the deterministic mock.
    pub use_vertex: bool,
    pub gcp_project: Option<String>,
    pub gcp_region: String,
    pub vertex_endpoint_id: Option<String>,
    pub vertex_model_name: String,
    /// Bearer token for remote prediction and object storage calls.
    #[serde(skip_serializing, default)]
    pub gcp_access_token: Option<String>,

    /// Directory holding the case log, local evidence and eval reports.
    pub artifacts_path: PathBuf,
    /// Write evidence to the object store instead of `artifacts_path`.
    pub use_gcs: bool,
    pub gcs_bucket: Option<String>,

    /// How case listing treats unparseable log lines.
    pub case_listing_mode: ListingMode,

    /// OCR and priority thresholds handed to the orchestrator.
    pub policy: PolicyConfig,

    /// Listen address for the HTTP daemon.
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            json_logging: true,
            debug: false,
            api_title: "TrafficIQ".to_string(),
            api_version: env!("CARGO_PKG_VERSION").to_string(),
            use_vertex: false,
            gcp_project: None,
            gcp_region: "us-central1".to_string(),
            vertex_endpoint_id: None,
            vertex_model_name: "gemma-3n-tuned-vehicles".to_string(),
            gcp_access_token: None,
            artifacts_path: PathBuf::from("./artifacts"),
            use_gcs: false,
            gcs_bucket: None,
            case_listing_mode: ListingMode::default(),
            policy: PolicyConfig::default(),
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Settings {
    /// Create settings from process environment variables.
    ///
    /// Reads (all optional):
    /// - ENVIRONMENT, LOG_LEVEL, JSON_LOGGING, DEBUG, API_TITLE, API_VERSION
    /// - USE_VERTEX, GCP_PROJECT, GCP_REGION, VERTEX_ENDPOINT_ID, VERTEX_MODEL_NAME, GCP_ACCESS_TOKEN
    /// - ARTIFACTS_PATH, USE_GCS, GCS_BUCKET, CASE_LISTING_MODE, BIND_ADDR
    /// - OCR_SKIP_CONFIDENCE, P0_MIN_CONFIDENCE, P1_MIN_CONFIDENCE
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create settings from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let get = |key: &str| lookup(key).and_then(non_empty);
        let flag = |key: &str, default: bool| get(key).map(|v| parse_bool(&v)).unwrap_or(default);

        let case_listing_mode = match get("CASE_LISTING_MODE") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "unknown CASE_LISTING_MODE, using default");
                defaults.case_listing_mode
            }),
            None => defaults.case_listing_mode,
        };

        let threshold = |key: &str, default: f64| match get(key) {
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) if (0.0..=1.0).contains(&value) => value,
                _ => {
                    tracing::warn!(key, value = %raw, "threshold must be a number in [0, 1], using default");
                    default
                }
            },
            None => default,
        };
        let policy = PolicyConfig {
            min_vehicle_confidence_for_skip_ocr: threshold(
                "OCR_SKIP_CONFIDENCE",
                defaults.policy.min_vehicle_confidence_for_skip_ocr,
            ),
            p0_min_confidence: threshold("P0_MIN_CONFIDENCE", defaults.policy.p0_min_confidence),
            p1_min_confidence: threshold("P1_MIN_CONFIDENCE", defaults.policy.p1_min_confidence),
        };

        Settings {
            environment: get("ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: flag("JSON_LOGGING", defaults.json_logging),
            debug: flag("DEBUG", defaults.debug),
            api_title: get("API_TITLE").unwrap_or(defaults.api_title),
            api_version: get("API_VERSION").unwrap_or(defaults.api_version),
            use_vertex: flag("USE_VERTEX", defaults.use_vertex),
            gcp_project: get("GCP_PROJECT"),
            gcp_region: get("GCP_REGION").unwrap_or(defaults.gcp_region),
            vertex_endpoint_id: get("VERTEX_ENDPOINT_ID"),
            vertex_model_name: get("VERTEX_MODEL_NAME").unwrap_or(defaults.vertex_model_name),
            gcp_access_token: get("GCP_ACCESS_TOKEN"),
            artifacts_path: get("ARTIFACTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifacts_path),
            use_gcs: flag("USE_GCS", defaults.use_gcs),
            gcs_bucket: get("GCS_BUCKET"),
            case_listing_mode,
            policy,
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }

    /// Set the artifacts directory
    pub fn with_artifacts_path(mut self, path: impl AsRef<Path>) -> Self {
        self.artifacts_path = path.as_ref().to_path_buf();
        self
    }

    /// Set the environment name
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Route evidence to an object-store bucket
    pub fn with_gcs_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.use_gcs = true;
        self.gcs_bucket = Some(bucket.into());
        self
    }

    /// Set case listing mode
    pub fn with_case_listing_mode(mut self, mode: ListingMode) -> Self {
        self.case_listing_mode = mode;
        self
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Set OCR and priority thresholds
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Tracing level named by `log_level`, defaulting to INFO when unparseable.
    /// `debug` raises anything coarser to DEBUG.
    pub fn tracing_level(&self) -> Level {
        let level = Level::from_str(self.log_level.trim()).unwrap_or(Level::INFO);
        if self.debug && level < Level::DEBUG {
            Level::DEBUG
        } else {
            level
        }
    }

    /// Ensure the artifacts directory exists and return it.
    pub fn ensure_artifacts_dir(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.artifacts_path)?;
        Ok(self.artifacts_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings.environment, "development");
        assert!(!settings.use_vertex);
        assert!(!settings.use_gcs);
        assert_eq!(settings.artifacts_path, PathBuf::from("./artifacts"));
        assert_eq!(settings.case_listing_mode, ListingMode::Lenient);
        assert!(settings.is_development());
        assert!(!settings.is_production());
    }

    #[test]
    fn reads_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("ENVIRONMENT", "Production"),
            ("USE_GCS", "true"),
            ("GCS_BUCKET", "evidence-bucket"),
            ("ARTIFACTS_PATH", "/var/lib/trafficiq"),
            ("JSON_LOGGING", "0"),
            ("CASE_LISTING_MODE", "strict"),
            ("LOG_LEVEL", "debug"),
        ]));
        assert!(settings.is_production());
        assert!(settings.use_gcs);
        assert_eq!(settings.gcs_bucket.as_deref(), Some("evidence-bucket"));
        assert_eq!(settings.artifacts_path, PathBuf::from("/var/lib/trafficiq"));
        assert!(!settings.json_logging);
        assert_eq!(settings.case_listing_mode, ListingMode::Strict);
        assert_eq!(settings.tracing_level(), Level::DEBUG);
    }

    #[test]
    fn blank_values_are_ignored() {
        let settings = Settings::from_lookup(lookup_from(&[("GCS_BUCKET", "  "), ("GCP_REGION", "")]));
        assert!(settings.gcs_bucket.is_none());
        assert_eq!(settings.gcp_region, "us-central1");
    }

    #[test]
    fn policy_thresholds_from_env() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("OCR_SKIP_CONFIDENCE", "0.8"),
            ("P0_MIN_CONFIDENCE", "0.9"),
            ("P1_MIN_CONFIDENCE", "1.5"),
        ]));
        assert_eq!(settings.policy.min_vehicle_confidence_for_skip_ocr, 0.8);
        assert_eq!(settings.policy.p0_min_confidence, 0.9);
        // out of range keeps the default
        assert_eq!(settings.policy.p1_min_confidence, 0.50);
        assert_eq!(Settings::from_lookup(|_| None).policy, PolicyConfig::default());
    }

    #[test]
    fn debug_flag_raises_level() {
        let settings = Settings::from_lookup(lookup_from(&[("DEBUG", "yes"), ("LOG_LEVEL", "warn")]));
        assert!(settings.debug);
        assert_eq!(settings.tracing_level(), Level::DEBUG);

        let trace = Settings {
            log_level: "trace".to_string(),
            ..settings
        };
        assert_eq!(trace.tracing_level(), Level::TRACE);
    }

    #[test]
    fn unknown_listing_mode_falls_back() {
        let settings = Settings::from_lookup(lookup_from(&[("CASE_LISTING_MODE", "chaotic")]));
        assert_eq!(settings.case_listing_mode, ListingMode::Lenient);
    }

    #[test]
    fn bad_log_level_defaults_to_info() {
        let settings = Settings::default();
        let settings = Settings {
            log_level: "loud".to_string(),
            ..settings
        };
        assert_eq!(settings.tracing_level(), Level::INFO);
    }

    #[test]
    fn access_token_not_serialized() {
        let settings = Settings {
            gcp_access_token: Some("secret".to_string()),
            ..Settings::default()
        };
        let raw = serde_json::to_string(&settings).unwrap();
        assert!(!raw.contains("secret"));
    }

    #[test]
    fn ensure_artifacts_dir_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("artifacts");
        let settings = Settings::default().with_artifacts_path(&target);
        let created = settings.ensure_artifacts_dir().unwrap();
        assert!(created.is_dir());
    }
}
