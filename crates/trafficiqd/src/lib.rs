//! TrafficIQ HTTP front end
//!
//! Thin axum layer over [`TrafficAgent`]. Every failure surfaces as a
//! `{"detail": "..."}` body so clients get one error shape.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use trafficiq_core::{
    AgentResult, AgentRunRequest, AnalyzeRequest, CaseRecord, HealthResponse, Settings,
    TrafficAgent, VehiclePrediction, DEFAULT_LIST_LIMIT, METRICS,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    agent: Arc<TrafficAgent>,
    settings: Arc<Settings>,
}

impl AppState {
    pub fn new(agent: TrafficAgent, settings: Settings) -> Self {
        Self {
            agent: Arc::new(agent),
            settings: Arc::new(settings),
        }
    }

    pub fn from_settings(settings: Settings) -> trafficiq_core::Result<Self> {
        let agent = TrafficAgent::from_settings(&settings)?;
        Ok(Self::new(agent, settings))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
}

fn internal(detail: String) -> ApiError {
    error!(%detail, "request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, detail)
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/agent/run", post(agent_run))
        .route("/cases", get(list_cases))
        .route("/cases/:case_id", get(get_case))
        .with_state(state)
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.settings.api_version.clone(),
        environment: state.settings.environment.clone(),
    })
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<VehiclePrediction>, ApiError> {
    state
        .agent
        .predictor()
        .predict_vehicle(&req.image_uri)
        .await
        .map(Json)
        .map_err(|e| internal(format!("Prediction failed: {e}")))
}

pub async fn agent_run(
    State(state): State<AppState>,
    Json(req): Json<AgentRunRequest>,
) -> Result<Json<AgentResult>, ApiError> {
    let result = state
        .agent
        .run(req)
        .await
        .map_err(|e| internal(format!("Agent run failed: {e}")))?;
    info!(
        priority = %result.priority,
        steps = result.processing_steps.len(),
        "agent run served"
    );
    METRICS.flush();
    Ok(Json(result))
}

pub async fn list_cases(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<CaseRecord>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    state
        .agent
        .cases()
        .list_cases(limit)
        .await
        .map(Json)
        .map_err(|e| internal(format!("Failed to list cases: {e}")))
}

pub async fn get_case(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<CaseRecord>, ApiError> {
    match state.agent.cases().get_case(&case_id).await {
        Ok(Some(case)) => Ok(Json(case)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Case not found")),
        Err(e) => Err(internal(format!("Failed to get case: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trafficiq_core::fakes::{MemoryCaseStore, MemoryEvidenceStore};
    use trafficiq_core::{
        CaseRecorder, EvidenceRecorder, MockPlateReader, MockVehiclePredictor, MockWatchlist,
    };

    fn state_with(cases: MemoryCaseStore, evidence: MemoryEvidenceStore) -> AppState {
        let agent = TrafficAgent::new(
            Arc::new(MockVehiclePredictor::new()),
            Arc::new(MockPlateReader::new()),
            Arc::new(MockWatchlist::default()),
            EvidenceRecorder::new(Arc::new(evidence)),
            CaseRecorder::new(Arc::new(cases)),
        );
        AppState::new(agent, Settings::default().with_environment("test"))
    }

    fn memory_state() -> AppState {
        state_with(MemoryCaseStore::new(), MemoryEvidenceStore::new())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health(State(memory_state())).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.environment, "test");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn analyze_returns_prediction() {
        let Json(p) = analyze(
            State(memory_state()),
            Json(AnalyzeRequest {
                image_uri: "gs://b/night_1.jpg".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(p.image_uri, "gs://b/night_1.jpg");
        assert!(p.confidence > 0.0 && p.confidence <= 1.0);
    }

    #[tokio::test]
    async fn run_then_fetch_case() {
        let state = memory_state();
        let Json(result) = agent_run(
            State(state.clone()),
            Json(AgentRunRequest::new("gs://b/clear_1.jpg").with_location("Main St")),
        )
        .await
        .unwrap();
        let case = result.case_record.unwrap();

        let Json(fetched) = get_case(State(state.clone()), Path(case.case_id.clone()))
            .await
            .unwrap();
        assert_eq!(fetched, case);

        let Json(listed) = list_cases(State(state), Query(ListParams { limit: None }))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn unknown_case_is_404() {
        let (status, Json(body)) = get_case(State(memory_state()), Path("CASE-0".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.detail, "Case not found");
    }

    #[tokio::test]
    async fn pipeline_failure_is_500_with_detail() {
        let state = state_with(MemoryCaseStore::new(), MemoryEvidenceStore::failing());
        let (status, Json(body)) = agent_run(State(state), Json(AgentRunRequest::new("a.jpg")))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.detail.starts_with("Agent run failed"));
    }

    #[tokio::test]
    async fn list_limit_is_respected() {
        let state = memory_state();
        for i in 0..3 {
            let Json(result) = agent_run(
                State(state.clone()),
                Json(AgentRunRequest::new(format!("img_{i}.jpg"))),
            )
            .await
            .unwrap();
            assert!(result.case_record.is_some());
        }
        let Json(listed) = list_cases(State(state), Query(ListParams { limit: Some(2) }))
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn router_builds() {
        let _ = router(memory_state());
    }
}
