use async_trait::async_trait;
use tracing::debug;

use super::EvidenceStore;
use crate::config::Settings;
use crate::domain::{Result, TrafficError};

const DEFAULT_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Object prefix for evidence documents inside the bucket.
pub const EVIDENCE_PREFIX: &str = "evidence";

/// Evidence documents uploaded to a Cloud Storage bucket via the JSON API.
pub struct GcsEvidenceStore {
    bucket: String,
    upload_base: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl GcsEvidenceStore {
    /// Fails with a configuration error when no bucket is set.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let bucket = settings
            .gcs_bucket
            .clone()
            .ok_or_else(|| TrafficError::Config("GCS_BUCKET not configured".to_string()))?;
        Self::new(bucket, settings.gcp_access_token.clone())
    }

    pub fn new(bucket: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("trafficiq-core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            bucket: bucket.into(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            token,
            http_client,
        })
    }

    /// Point uploads at another storage API root.
    pub fn with_upload_base(mut self, base: impl Into<String>) -> Self {
        self.upload_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a preconfigured client (proxy, timeouts, TLS roots).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object_name(name: &str) -> String {
        format!("{EVIDENCE_PREFIX}/{name}")
    }

    pub fn upload_url(&self) -> String {
        format!("{}/b/{}/o", self.upload_base, self.bucket)
    }

    pub fn object_uri(&self, name: &str) -> String {
        format!("gs://{}/{}", self.bucket, Self::object_name(name))
    }
}

#[async_trait]
impl EvidenceStore for GcsEvidenceStore {
    async fn put(&self, name: &str, body: &[u8]) -> Result<String> {
        let object = Self::object_name(name);
        debug!(bucket = %self.bucket, object = %object, "uploading evidence");

        let mut request = self
            .http_client
            .post(self.upload_url())
            .query(&[("uploadType", "media"), ("name", object.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrafficError::Remote {
                service: "object-store".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(self.object_uri(name))
    }

    fn is_local(&self) -> bool {
        false
    }
}
