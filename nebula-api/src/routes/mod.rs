//! HTTP surface: REST routes per resource kind plus an MCP-style tool-call
//! router, all funneling mutations through [`mutate`] so a trusted caller's
//! direct REST write and an approved agent's deferred one run the exact
//! same executor dispatch. Grounded on `nebula_api/routes/*.py`'s
//! per-resource route modules and `nebula_mcp/server.py`'s tool dispatch
//! table.

mod approvals;
mod audit;
mod enrollment;
mod health;
mod keys;
mod mcp;
mod records;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use nebula_approvals::ApprovalExecutor;
use nebula_core::{AuditIdentity, Caller};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn create_api_router(state: AppState) -> Router {
    let open = Router::new()
        .merge(health::router())
        .merge(enrollment::router());

    let protected = Router::new()
        .merge(records::router())
        .merge(approvals::router())
        .merge(audit::router())
        .merge(keys::router())
        .merge(mcp::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth_middleware,
        ));

    Router::new()
        .merge(open)
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit_middleware,
        ))
        .with_state(state)
}

/// `{"data": ..., "meta"?: {...}}` success envelope, per the external
/// interface contract.
#[derive(Serialize)]
struct SuccessEnvelope<T: Serialize> {
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PageMeta {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

pub(crate) fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(SuccessEnvelope { data, meta: None })).into_response()
}

pub(crate) fn ok_page<T: Serialize>(data: T, meta: PageMeta) -> Response {
    (
        StatusCode::OK,
        Json(SuccessEnvelope {
            data,
            meta: Some(meta),
        }),
    )
        .into_response()
}

/// A bootstrap caller has no audit identity of its own — it may only reach
/// the three enrollment tools, which never call this.
pub(crate) fn audit_identity_of(caller: &Caller) -> ApiResult<AuditIdentity> {
    match caller {
        Caller::User { user_id, .. } => Ok(AuditIdentity::User(*user_id)),
        Caller::Agent { agent_id, .. } => Ok(AuditIdentity::Agent(*agent_id)),
        Caller::Bootstrap => Err(ApiError::enrollment_required()),
    }
}

/// Narrows a create payload's `scopes` array down to what the caller
/// actually holds, in place. A no-op if the field is absent or not an
/// array of strings.
pub(crate) fn narrow_scopes_field(payload: &mut Value, caller: &Caller) {
    let Some(obj) = payload.as_object_mut() else {
        return;
    };
    let Some(Value::Array(raw)) = obj.get("scopes") else {
        return;
    };
    let requested: HashSet<String> = raw.iter().filter_map(|v| v.as_str()).map(String::from).collect();
    let narrowed = nebula_context::subset(&requested, caller.effective_scope_names());
    obj.insert(
        "scopes".to_string(),
        Value::Array(narrowed.into_iter().map(Value::String).collect()),
    );
}

/// Stamps `value` onto `payload[field]`, used to carry a path parameter
/// into the closed-shape `UpdateXInput` the executor deserializes.
pub(crate) fn merge_field(payload: &mut Value, field: &str, value: impl Serialize) {
    if let Value::Object(obj) = payload {
        obj.insert(field.to_string(), serde_json::to_value(value).unwrap_or(Value::Null));
    }
}

/// Re-serializes a record and, if it carries a `metadata` object, filters
/// its `context_segments` down to what the caller's scopes can see before
/// handing the value back to the transport layer.
pub(crate) fn filter_record_segments(record: impl Serialize, caller: &Caller) -> ApiResult<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Some(obj) = value.as_object_mut() {
        if let Some(metadata) = obj.get("metadata").cloned() {
            obj.insert(
                "metadata".to_string(),
                nebula_context::filter_segments(&metadata, caller.effective_scope_names()),
            );
        }
    }
    Ok(value)
}

/// Runs `action` through the approval gate first: an untrusted agent's
/// proposal is captured and handed back as the `202 approval_required`
/// envelope, everyone else (trusted agents, users, bootstrap-ineligible
/// here since bootstrap never reaches this helper) goes straight to the
/// executor under their own audit identity.
pub(crate) async fn mutate(
    state: &AppState,
    caller: &Caller,
    action: &str,
    payload: Value,
    related_job_id: Option<String>,
) -> ApiResult<Response> {
    if let Some(captured) = state
        .approval_gate
        .intercept(caller, action, payload.clone(), related_job_id)
        .await?
    {
        return Ok((StatusCode::ACCEPTED, Json(captured)).into_response());
    }

    let identity = audit_identity_of(caller)?;
    let (_linked_id, result) = state.executors.execute(action, &payload, identity).await?;
    Ok(ok(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::UserId;
    use std::collections::HashSet;

    fn user(scopes: &[&str]) -> Caller {
        let names: HashSet<String> = scopes.iter().map(|s| s.to_string()).collect();
        Caller::User {
            user_id: UserId::now_v7(),
            owner_scope_names: names.clone(),
            effective_scope_names: names,
        }
    }

    fn bootstrap() -> Caller {
        Caller::Bootstrap
    }

    #[test]
    fn audit_identity_of_rejects_bootstrap() {
        assert!(audit_identity_of(&bootstrap()).is_err());
    }

    #[test]
    fn audit_identity_of_accepts_user() {
        let caller = user(&["personal"]);
        assert!(audit_identity_of(&caller).is_ok());
    }

    #[test]
    fn narrow_scopes_field_intersects_with_caller() {
        let caller = user(&["personal", "work"]);
        let mut payload = serde_json::json!({
            "name": "widget",
            "scopes": ["personal", "sensitive"],
        });
        narrow_scopes_field(&mut payload, &caller);
        let narrowed: HashSet<String> = payload["scopes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert_eq!(narrowed, HashSet::from(["personal".to_string()]));
    }

    #[test]
    fn narrow_scopes_field_is_noop_without_scopes_key() {
        let caller = user(&["personal"]);
        let mut payload = serde_json::json!({ "name": "widget" });
        let before = payload.clone();
        narrow_scopes_field(&mut payload, &caller);
        assert_eq!(payload, before);
    }

    #[test]
    fn merge_field_stamps_value_onto_object() {
        let mut payload = serde_json::json!({ "title": "do the thing" });
        merge_field(&mut payload, "job_id", "2026Q3-0001");
        assert_eq!(payload["job_id"], "2026Q3-0001");
    }

    #[test]
    fn filter_record_segments_passes_through_records_without_metadata() {
        #[derive(Serialize)]
        struct Bare {
            id: &'static str,
        }
        let caller = user(&["personal"]);
        let value = filter_record_segments(Bare { id: "x" }, &caller).unwrap();
        assert_eq!(value["id"], "x");
    }
}
