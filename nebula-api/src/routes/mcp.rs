//! MCP-style tool-call surface: a single `POST /mcp/tools/:action` endpoint
//! that dispatches by name instead of by REST resource path, so an agent's
//! tool-calling loop can invoke any mutation through one shape. Shares
//! [`super::mutate`] with the REST routes — a tool call and a REST write hit
//! the identical approval gate and executor. Grounded on
//! `nebula_mcp/server.py`'s tool dispatch table.
//!
//! Every write path runs the same scope-mediator check `routes/records.rs`
//! applies on its REST counterpart before reaching the approval gate — the
//! gate only decides trusted-vs-deferred, it never re-checks access, so
//! this is the trust boundary (`nebula_mcp/helpers.py`'s per-tool
//! `_require_*` calls ahead of `execute_tool`). Since a tool call carries no
//! path parameter, the id each check needs is read back out of the
//! caller-supplied payload instead of a route extractor.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Json, Router};
use nebula_core::{Caller, EntityId, FileId, KnowledgeItemId, NodeRef};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthenticatedCaller;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::{merge_field, mutate};

const ENROLLMENT_TOOLS: &[&str] = &["agent_enroll_start", "agent_enroll_wait", "agent_enroll_redeem"];

pub fn router() -> Router<AppState> {
    Router::new().route("/mcp/tools/:action", axum::routing::post(call_tool))
}

fn field<T: serde::de::DeserializeOwned>(payload: &Value, key: &str) -> ApiResult<T> {
    let value = payload
        .get(key)
        .ok_or_else(|| ApiError::invalid_input(format!("'{key}' is required")))?;
    serde_json::from_value(value.clone()).map_err(ApiError::from)
}

#[derive(Deserialize)]
struct BulkEntityIds {
    entity_ids: Vec<EntityId>,
}

#[derive(Deserialize)]
struct RelationshipEndpoints {
    source: NodeRef,
    target: NodeRef,
}

/// Runs the same access check the matching REST handler in `records.rs`
/// applies, against the id(s) embedded in the tool-call payload. A no-op
/// for actions with no dedicated write-access method (creates narrow their
/// own scopes instead; logs/protocols rely on the approval gate alone).
async fn enforce_write_access(state: &AppState, caller: &Caller, action: &str, payload: &mut Value) -> ApiResult<()> {
    match action {
        "update_entity" | "revert_entity" => {
            let id: EntityId = field(payload, "entity_id")?;
            state
                .scope_mediator
                .entity_write_access(caller, std::slice::from_ref(&id))
                .await?;
        }
        "bulk_update_entity_tags" | "bulk_update_entity_scopes" => {
            let ids: BulkEntityIds = serde_json::from_value(payload.clone())?;
            state.scope_mediator.entity_write_access(caller, &ids.entity_ids).await?;
        }
        "update_knowledge" => {
            let id: KnowledgeItemId = field(payload, "knowledge_id")?;
            state
                .scope_mediator
                .knowledge_write_access(caller, std::slice::from_ref(&id))
                .await?;
        }
        "create_relationship" => {
            let endpoints: RelationshipEndpoints = serde_json::from_value(payload.clone())?;
            state.scope_mediator.relationship_endpoint_check(caller, &endpoints.source).await?;
            state.scope_mediator.relationship_endpoint_check(caller, &endpoints.target).await?;
        }
        "update_job" | "update_job_status" => {
            let id: String = field(payload, "job_id")?;
            state.scope_mediator.job_ownership(caller, &id).await?;
        }
        "update_file" => {
            let id: FileId = field(payload, "file_id")?;
            if !state.scope_mediator.file_visibility(caller, id).await? {
                return Err(ApiError::not_found("file"));
            }
        }
        "create_job" => {
            // An agent can only ever create jobs it owns, same as the REST
            // handler — the caller's own agent_id overrides the payload's.
            if let Some(agent_id) = caller.agent_id() {
                merge_field(payload, "agent_id", agent_id);
            }
        }
        "create_entity" | "create_knowledge" | "create_protocol" => {
            super::narrow_scopes_field(payload, caller);
        }
        _ => {}
    }
    Ok(())
}

async fn call_tool(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(action): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<Response> {
    if caller.is_bootstrap() && !ENROLLMENT_TOOLS.contains(&action.as_str()) {
        return Err(ApiError::enrollment_required());
    }

    if let Caller::Bootstrap = caller {
        // The three enrollment tools are served by the unauthenticated
        // `enrollment` router under their own request/response shapes, not
        // by the generic executor dispatch table this router feeds.
        return Err(ApiError::invalid_input(format!(
            "{action} must be called via its dedicated /agents/register endpoint"
        )));
    }

    let mut payload = payload;
    enforce_write_access(&state, &caller, &action, &mut payload).await?;
    mutate(&state, &caller, &action, payload, None).await
}
