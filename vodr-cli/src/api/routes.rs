//! Recovery and health routes.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use vod_recovery::{BroadcastIdentity, NoProgress, VodRecoveryOutcome};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

/// Body of `POST /`.
#[derive(Debug, Deserialize)]
pub struct RecoverRequest {
    pub streamer_name: String,
    pub stream_id: String,
    /// `YYYY-MM-DD HH:MM:SS`, UTC
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(recover_vod))
        .route("/health", get(health_check))
}

async fn recover_vod(
    State(state): State<AppState>,
    payload: Result<Json<RecoverRequest>, JsonRejection>,
) -> ApiResult<Json<VodRecoveryOutcome>> {
    let Json(request) =
        payload.map_err(|e| ApiError::bad_request(format!("Invalid JSON in request body: {e}")))?;
    let identity =
        BroadcastIdentity::parse(&request.streamer_name, &request.stream_id, &request.timestamp)?;

    tracing::info!(identity = %identity, "Recovery requested");
    let outcome = state.engine.recover(&identity, &NoProgress).await?;
    Ok(Json(outcome))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
