//! API key CRUD, grounded on `nebula_api/auth.py`'s `generate_api_key` and
//! the `api_keys/*` query set referenced by spec.md §3's supplement.

use crate::rows::opt_id_col;
use crate::Store;
use nebula_core::{ApiKey, ApiKeyId, EntityIdType, NebulaAgentId, NebulaResult, StoreError, Timestamp, UserId};
use tokio_postgres::Row;

fn from_row(row: &Row) -> ApiKey {
    ApiKey {
        id: opt_id_col::<ApiKeyId>(row, "id").expect("api_keys.id is not null"),
        key_hash: row.get("key_hash"),
        prefix: row.get("prefix"),
        entity_id: opt_id_col(row, "entity_id"),
        agent_id: opt_id_col(row, "agent_id"),
        scopes: row.get("scopes"),
        label: row.get("label"),
        last_used_at: row.get("last_used_at"),
        revoked_at: row.get("revoked_at"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }
}

pub struct NewApiKey {
    pub key_hash: String,
    pub prefix: String,
    pub entity_id: Option<UserId>,
    pub agent_id: Option<NebulaAgentId>,
    pub scopes: Vec<String>,
    pub label: String,
    pub expires_at: Option<Timestamp>,
}

impl Store {
    pub async fn create_api_key(&self, new: &NewApiKey) -> NebulaResult<ApiKey> {
        let client = self.client().await?;
        let sql = self.queries().get("api_keys/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.key_hash,
                    &new.prefix,
                    &new.entity_id.map(|id| id.as_uuid()),
                    &new.agent_id.map(|id| id.as_uuid()),
                    &new.scopes,
                    &new.label,
                    &new.expires_at,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(from_row(&row))
    }

    /// Prefix lookup is the authenticator's first step (`Authorization:
    /// Bearer <key>` -> 8-char prefix -> row -> Argon2 verify).
    pub async fn get_api_key_by_prefix(&self, prefix: &str) -> NebulaResult<Option<ApiKey>> {
        let client = self.client().await?;
        let sql = self.queries().get("api_keys/get_by_prefix")?;
        let row = client
            .query_opt(&*sql, &[&prefix])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(from_row))
    }

    /// Best-effort, fire-and-forget per spec.md §9: callers wrap this in a
    /// detached `tokio::spawn` rather than awaiting it on the request path.
    pub async fn update_api_key_last_used(&self, id: ApiKeyId, at: Timestamp) -> NebulaResult<()> {
        let client = self.client().await?;
        let sql = self.queries().get("api_keys/update_last_used")?;
        client
            .execute(&*sql, &[&id.as_uuid(), &at])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub async fn revoke_api_key(&self, id: ApiKeyId, at: Timestamp) -> NebulaResult<()> {
        let client = self.client().await?;
        let sql = self.queries().get("api_keys/revoke")?;
        let updated = client
            .execute(&*sql, &[&id.as_uuid(), &at])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                kind: "api_key",
                id: id.as_uuid(),
            }
            .into());
        }
        Ok(())
    }
}
