//! Per-resource-kind REST routes: a single-record `GET` backed directly by
//! [`nebula_storage::Store`], and `POST`/`PATCH` writes that funnel through
//! [`super::mutate`] so they run under the same approval gate and executor
//! dispatch as the MCP tool surface. Grounded on `nebula_api/routes/{entities,
//! knowledge,relationships,jobs,logs,files,protocols}.py`.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use nebula_core::{EntityId, FileId, KnowledgeItemId, LogId, NodeRef, ProtocolId, RelationshipId};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthenticatedCaller;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::{filter_record_segments, merge_field, mutate, narrow_scopes_field, ok};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/entities", post(create_entity))
        .route("/entities/:id", get(get_entity).patch(update_entity))
        .route("/entities/:id/revert", post(revert_entity))
        .route("/entities/bulk/tags", post(bulk_update_entity_tags))
        .route("/entities/bulk/scopes", post(bulk_update_entity_scopes))
        .route("/knowledge", post(create_knowledge))
        .route("/knowledge/:id", get(get_knowledge).patch(update_knowledge))
        .route("/relationships", post(create_relationship))
        .route("/relationships/:id", get(get_relationship).patch(update_relationship))
        .route("/jobs", post(create_job))
        .route("/jobs/:id", get(get_job).patch(update_job))
        .route("/jobs/:id/status", post(update_job_status))
        .route("/logs", post(create_log))
        .route("/logs/:id", get(get_log).patch(update_log))
        .route("/files", post(create_file))
        .route("/files/:id", get(get_file).patch(update_file))
        .route("/protocols", post(create_protocol))
        .route("/protocols/:id", get(get_protocol).patch(update_protocol))
}

// ---------------------------------------------------------------------
// entities
// ---------------------------------------------------------------------

async fn create_entity(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    narrow_scopes_field(&mut payload, &caller);
    mutate(&state, &caller, "create_entity", payload, None).await
}

async fn get_entity(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<EntityId>,
) -> ApiResult<Response> {
    let entity = state
        .store
        .get_entity(id)
        .await?
        .ok_or_else(|| ApiError::not_found("entity"))?;
    Ok(ok(filter_record_segments(entity, &caller)?))
}

async fn update_entity(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<EntityId>,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    state
        .scope_mediator
        .entity_write_access(&caller, std::slice::from_ref(&id))
        .await?;
    merge_field(&mut payload, "entity_id", id);
    mutate(&state, &caller, "update_entity", payload, None).await
}

#[derive(Deserialize)]
struct RevertBody {
    audit_row_id: uuid::Uuid,
}

async fn revert_entity(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<EntityId>,
    Json(body): Json<RevertBody>,
) -> ApiResult<Response> {
    state
        .scope_mediator
        .entity_write_access(&caller, std::slice::from_ref(&id))
        .await?;
    let payload = serde_json::json!({
        "entity_id": id,
        "audit_row_id": body.audit_row_id,
    });
    mutate(&state, &caller, "revert_entity", payload, None).await
}

#[derive(Deserialize)]
struct BulkEntityIds {
    entity_ids: Vec<EntityId>,
}

async fn bulk_update_entity_tags(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(payload): Json<Value>,
) -> ApiResult<Response> {
    let ids: BulkEntityIds = serde_json::from_value(payload.clone())?;
    state
        .scope_mediator
        .entity_write_access(&caller, &ids.entity_ids)
        .await?;
    mutate(&state, &caller, "bulk_update_entity_tags", payload, None).await
}

async fn bulk_update_entity_scopes(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(payload): Json<Value>,
) -> ApiResult<Response> {
    let ids: BulkEntityIds = serde_json::from_value(payload.clone())?;
    state
        .scope_mediator
        .entity_write_access(&caller, &ids.entity_ids)
        .await?;
    mutate(&state, &caller, "bulk_update_entity_scopes", payload, None).await
}

// ---------------------------------------------------------------------
// knowledge
// ---------------------------------------------------------------------

async fn create_knowledge(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    narrow_scopes_field(&mut payload, &caller);
    mutate(&state, &caller, "create_knowledge", payload, None).await
}

async fn get_knowledge(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<KnowledgeItemId>,
) -> ApiResult<Response> {
    let item = state
        .store
        .get_knowledge(id)
        .await?
        .ok_or_else(|| ApiError::not_found("knowledge_item"))?;
    Ok(ok(filter_record_segments(item, &caller)?))
}

async fn update_knowledge(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<KnowledgeItemId>,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    state
        .scope_mediator
        .knowledge_write_access(&caller, std::slice::from_ref(&id))
        .await?;
    merge_field(&mut payload, "knowledge_id", id);
    mutate(&state, &caller, "update_knowledge", payload, None).await
}

// ---------------------------------------------------------------------
// relationships
// ---------------------------------------------------------------------

#[derive(Deserialize)]
struct RelationshipEndpoints {
    source: NodeRef,
    target: NodeRef,
}

async fn create_relationship(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(payload): Json<Value>,
) -> ApiResult<Response> {
    let endpoints: RelationshipEndpoints = serde_json::from_value(payload.clone())?;
    state
        .scope_mediator
        .relationship_endpoint_check(&caller, &endpoints.source)
        .await?;
    state
        .scope_mediator
        .relationship_endpoint_check(&caller, &endpoints.target)
        .await?;
    mutate(&state, &caller, "create_relationship", payload, None).await
}

async fn get_relationship(
    State(state): State<AppState>,
    AuthenticatedCaller(_caller): AuthenticatedCaller,
    Path(id): Path<RelationshipId>,
) -> ApiResult<Response> {
    let relationship = state
        .store
        .get_relationship(id)
        .await?
        .ok_or_else(|| ApiError::not_found("relationship"))?;
    Ok(ok(relationship))
}

async fn update_relationship(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<RelationshipId>,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    merge_field(&mut payload, "relationship_id", id);
    mutate(&state, &caller, "update_relationship", payload, None).await
}

// ---------------------------------------------------------------------
// jobs
// ---------------------------------------------------------------------

async fn create_job(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    // An agent can only ever create jobs it owns — the caller's own
    // agent_id overrides whatever the payload claims.
    if let Some(agent_id) = caller.agent_id() {
        merge_field(&mut payload, "agent_id", agent_id);
    }
    mutate(&state, &caller, "create_job", payload, None).await
}

async fn get_job(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    state.scope_mediator.job_ownership(&caller, &id).await?;
    let job = state
        .store
        .get_job(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("job"))?;
    Ok(ok(filter_record_segments(job, &caller)?))
}

async fn update_job(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    state.scope_mediator.job_ownership(&caller, &id).await?;
    merge_field(&mut payload, "job_id", &id);
    mutate(&state, &caller, "update_job", payload, None).await
}

async fn update_job_status(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    state.scope_mediator.job_ownership(&caller, &id).await?;
    merge_field(&mut payload, "job_id", &id);
    mutate(&state, &caller, "update_job_status", payload, None).await
}

// ---------------------------------------------------------------------
// logs
// ---------------------------------------------------------------------

async fn create_log(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(payload): Json<Value>,
) -> ApiResult<Response> {
    mutate(&state, &caller, "create_log", payload, None).await
}

async fn get_log(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<LogId>,
) -> ApiResult<Response> {
    let log = state
        .store
        .get_log(id)
        .await?
        .ok_or_else(|| ApiError::not_found("log"))?;
    Ok(ok(filter_record_segments(log, &caller)?))
}

async fn update_log(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<LogId>,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    merge_field(&mut payload, "log_id", id);
    mutate(&state, &caller, "update_log", payload, None).await
}

// ---------------------------------------------------------------------
// files
// ---------------------------------------------------------------------

async fn create_file(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(payload): Json<Value>,
) -> ApiResult<Response> {
    mutate(&state, &caller, "create_file", payload, None).await
}

async fn get_file(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<FileId>,
) -> ApiResult<Response> {
    if !state.scope_mediator.file_visibility(&caller, id).await? {
        return Err(ApiError::not_found("file"));
    }
    let file = state
        .store
        .get_file(id)
        .await?
        .ok_or_else(|| ApiError::not_found("file"))?;
    Ok(ok(filter_record_segments(file, &caller)?))
}

async fn update_file(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<FileId>,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    if !state.scope_mediator.file_visibility(&caller, id).await? {
        return Err(ApiError::not_found("file"));
    }
    merge_field(&mut payload, "file_id", id);
    mutate(&state, &caller, "update_file", payload, None).await
}

// ---------------------------------------------------------------------
// protocols
// ---------------------------------------------------------------------

async fn create_protocol(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    narrow_scopes_field(&mut payload, &caller);
    mutate(&state, &caller, "create_protocol", payload, None).await
}

async fn get_protocol(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<ProtocolId>,
) -> ApiResult<Response> {
    let protocol = state
        .store
        .get_protocol(id)
        .await?
        .ok_or_else(|| ApiError::not_found("protocol"))?;
    Ok(ok(filter_record_segments(protocol, &caller)?))
}

async fn update_protocol(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<ProtocolId>,
    Json(mut payload): Json<Value>,
) -> ApiResult<Response> {
    merge_field(&mut payload, "protocol_id", id);
    mutate(&state, &caller, "update_protocol", payload, None).await
}
