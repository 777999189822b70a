//! Review surface for deferred agent proposals. Every route here requires a
//! human [`crate::auth::ReviewerCaller`] — agents can create approval
//! requests (via [`super::mutate`]) but never resolve their own. Grounded on
//! `nebula_api/routes/approvals.py`.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use nebula_core::ApprovalRequestId;
use serde::Deserialize;

use crate::auth::ReviewerCaller;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::ok;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/approvals/pending", get(list_pending))
        .route("/approvals/:id", get(get_approval))
        .route("/approvals/:id/diff", get(diff_approval))
        .route("/approvals/:id/approve", post(approve))
        .route("/approvals/:id/reject", post(reject))
        .route("/approvals/:id/approve-agent", post(approve_register_agent))
}

async fn list_pending(State(state): State<AppState>, ReviewerCaller(_): ReviewerCaller) -> ApiResult<Response> {
    let pending = state.approval_engine.list_pending().await?;
    Ok(ok(pending))
}

async fn get_approval(
    State(state): State<AppState>,
    ReviewerCaller(_): ReviewerCaller,
    Path(id): Path<ApprovalRequestId>,
) -> ApiResult<Response> {
    let request = state.approval_engine.get(id).await?;
    Ok(ok(request))
}

async fn diff_approval(
    State(state): State<AppState>,
    ReviewerCaller(_): ReviewerCaller,
    Path(id): Path<ApprovalRequestId>,
) -> ApiResult<Response> {
    let diff = state.approval_engine.diff(id).await?;
    Ok(ok(diff))
}

async fn approve(
    State(state): State<AppState>,
    ReviewerCaller(user_id): ReviewerCaller,
    Path(id): Path<ApprovalRequestId>,
) -> ApiResult<Response> {
    let outcome = state
        .approval_engine
        .approve(id, user_id, &state.executors)
        .await?;
    Ok(ok(outcome))
}

#[derive(Deserialize)]
struct RejectBody {
    #[serde(default)]
    review_notes: Option<String>,
}

async fn reject(
    State(state): State<AppState>,
    ReviewerCaller(user_id): ReviewerCaller,
    Path(id): Path<ApprovalRequestId>,
    Json(body): Json<RejectBody>,
) -> ApiResult<Response> {
    let request = state
        .approval_engine
        .reject(id, user_id, body.review_notes)
        .await?;
    Ok(ok(request))
}

#[derive(Deserialize)]
struct ApproveAgentBody {
    #[serde(default)]
    grant_scopes: Option<Vec<String>>,
    #[serde(default)]
    grant_requires_approval: Option<bool>,
}

/// Agent enrollment resolves through its own engine method since activation
/// touches the agent row directly rather than going through the generic
/// executor dispatch table.
async fn approve_register_agent(
    State(state): State<AppState>,
    ReviewerCaller(user_id): ReviewerCaller,
    Path(id): Path<ApprovalRequestId>,
    Json(body): Json<ApproveAgentBody>,
) -> ApiResult<Response> {
    let active_status_id = state
        .registry
        .current()
        .statuses
        .id_of("active")
        .ok_or_else(|| ApiError::internal("missing 'active' status in taxonomy"))?;

    let grants = nebula_core::RegisterAgentGrants {
        grant_scopes: body.grant_scopes,
        grant_requires_approval: body.grant_requires_approval,
    };

    let outcome = state
        .approval_engine
        .approve_register_agent(id, user_id, grants, active_status_id)
        .await?;
    Ok(ok(outcome))
}
