//! Liveness and readiness probes. Unauthenticated, part of the `open`
//! router group. Grounded on `nebula_api/routes/health.py`.

use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde_json::json;

use crate::error::ApiResult;
use crate::state::AppState;

use super::ok;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(liveness)).route("/ready", get(readiness))
}

async fn liveness(State(state): State<AppState>) -> Response {
    ok(json!({
        "status": "ok",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn readiness(State(state): State<AppState>) -> ApiResult<Response> {
    state.store.pool().get().await.map_err(|e| {
        crate::error::ApiError::internal(format!("database pool unavailable: {e}"))
    })?;
    Ok(ok(json!({ "status": "ready" })))
}
