//! Self-service API key minting and revocation. Only a user may mint a key
//! for themselves — agents get their credential through enrollment instead.
//! Grounded on `nebula_api/auth.py`'s key-generation helper and
//! `nebula_api/routes/keys.py`.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{delete, post};
use axum::{Json, Router};
use chrono::Utc;
use nebula_context::generate_api_key;
use nebula_core::ApiKeyId;
use nebula_storage::NewApiKey;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use crate::auth::ReviewerCaller;
use crate::error::ApiResult;
use crate::state::AppState;

use super::ok;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/keys", post(mint))
        .route("/keys/:id", delete(revoke))
}

#[derive(Deserialize)]
struct MintBody {
    label: String,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    expires_at: Option<nebula_core::Timestamp>,
}

async fn mint(
    State(state): State<AppState>,
    ReviewerCaller(user_id): ReviewerCaller,
    Json(body): Json<MintBody>,
) -> ApiResult<Response> {
    let generated = generate_api_key();
    let new = NewApiKey {
        key_hash: generated.key_hash,
        prefix: generated.prefix,
        entity_id: Some(user_id),
        agent_id: None,
        scopes: body.scopes,
        label: body.label,
        expires_at: body.expires_at,
    };
    let key = state.store.create_api_key(&new).await?;
    Ok(ok(json!({
        "api_key": key,
        "raw_key": generated.raw.expose_secret(),
    })))
}

async fn revoke(
    State(state): State<AppState>,
    ReviewerCaller(_user_id): ReviewerCaller,
    Path(id): Path<ApiKeyId>,
) -> ApiResult<Response> {
    state.store.revoke_api_key(id, Utc::now()).await?;
    Ok(ok(json!({ "revoked": true })))
}
