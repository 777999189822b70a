//! Read-only audit trail queries: per-entity history, a general filtered
//! log query, and the distinct scopes/actors seen in it. Authenticated but
//! not scope-filtered further — the audit log is operational metadata, not
//! a context segment. Grounded on `nebula_api/routes/audit.py`.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use nebula_core::EntityId;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

use super::ok;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/audit/entities/:id/history", get(entity_history))
        .route("/audit/log", get(query_log))
        .route("/audit/scopes", get(list_scopes))
        .route("/audit/actors", get(list_actors))
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn entity_history(
    State(state): State<AppState>,
    crate::auth::AuthenticatedCaller(_caller): crate::auth::AuthenticatedCaller,
    Path(id): Path<EntityId>,
    Query(page): Query<PageParams>,
) -> ApiResult<Response> {
    let entries = state.store.list_entity_history(id, page.limit, page.offset).await?;
    Ok(ok(entries))
}

#[derive(Deserialize)]
struct AuditLogParams {
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    changed_by_type: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

async fn query_log(
    State(state): State<AppState>,
    crate::auth::AuthenticatedCaller(_caller): crate::auth::AuthenticatedCaller,
    Query(params): Query<AuditLogParams>,
) -> ApiResult<Response> {
    let entries = state
        .store
        .query_audit_log(
            params.table_name.as_deref(),
            params.changed_by_type.as_deref(),
            params.limit,
            params.offset,
        )
        .await?;
    Ok(ok(entries))
}

async fn list_scopes(
    State(state): State<AppState>,
    crate::auth::AuthenticatedCaller(_caller): crate::auth::AuthenticatedCaller,
) -> ApiResult<Response> {
    let scopes = state.store.list_audit_scopes().await?;
    Ok(ok(scopes))
}

#[derive(Deserialize)]
struct ActorsParams {
    #[serde(default)]
    actor_type: Option<String>,
}

async fn list_actors(
    State(state): State<AppState>,
    crate::auth::AuthenticatedCaller(_caller): crate::auth::AuthenticatedCaller,
    Query(params): Query<ActorsParams>,
) -> ApiResult<Response> {
    let actors = state.store.list_audit_actors(params.actor_type.as_deref()).await?;
    Ok(ok(actors))
}
