//! Unauthenticated agent self-registration surface: start → long-poll wait →
//! redeem. Lives in the `open` router group since a brand-new agent has no
//! bearer credential yet. Grounded on `nebula_mcp/enrollment.py`'s HTTP
//! mirror of the three enrollment tools.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use nebula_core::EnrollmentSessionId;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

use super::ok;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/agents/register", post(start))
        .route("/agents/register/:session_id/wait", post(wait))
        .route("/agents/register/:session_id/redeem", post(redeem))
}

#[derive(Deserialize)]
struct StartBody {
    name: String,
    #[serde(default)]
    requested_scopes: Vec<String>,
    #[serde(default)]
    requested_requires_approval: bool,
    #[serde(default)]
    capabilities: Vec<String>,
}

async fn start(State(state): State<AppState>, Json(body): Json<StartBody>) -> ApiResult<Response> {
    let outcome = state
        .enrollment_engine
        .enroll_start(
            &body.name,
            &body.requested_scopes,
            body.requested_requires_approval,
            body.capabilities,
        )
        .await?;
    Ok(ok(outcome))
}

#[derive(Deserialize)]
struct WaitBody {
    token: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    20
}

async fn wait(
    State(state): State<AppState>,
    Path(session_id): Path<EnrollmentSessionId>,
    Json(body): Json<WaitBody>,
) -> ApiResult<Response> {
    let outcome = state
        .enrollment_engine
        .enroll_wait(session_id, &body.token, body.timeout_seconds)
        .await?;
    Ok(ok(outcome))
}

#[derive(Deserialize)]
struct RedeemBody {
    token: String,
}

async fn redeem(
    State(state): State<AppState>,
    Path(session_id): Path<EnrollmentSessionId>,
    Json(body): Json<RedeemBody>,
) -> ApiResult<Response> {
    let redeemed = state.enrollment_engine.enroll_redeem(session_id, &body.token).await?;
    Ok(ok(redeemed))
}
