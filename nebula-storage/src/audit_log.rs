//! Read access to the append-only audit log, grounded on
//! `nebula_mcp/helpers.py`'s `query_audit_log`/`get_entity_history`/
//! `list_audit_scopes`/`list_audit_actors`. The log itself is written by
//! triggers on every mutating table, never by application code, so this
//! module is read-only — no `create_*`/`update_*` methods.

use crate::Store;
use nebula_core::{AuditEntry, AuditIdentity, NebulaAgentId, NebulaResult, StoreError, UserId};
use tokio_postgres::Row;

fn from_row(row: &Row) -> Result<AuditEntry, StoreError> {
    let changed_by_type: String = row.get("changed_by_type");
    let changed_by_id: uuid::Uuid = row.get("changed_by_id");
    let changed_by = match changed_by_type.as_str() {
        "entity" => AuditIdentity::User(UserId::new(changed_by_id)),
        "agent" => AuditIdentity::Agent(NebulaAgentId::new(changed_by_id)),
        other => {
            return Err(StoreError::QueryFailed {
                reason: format!("unknown audit actor type: {other}"),
            })
        }
    };
    Ok(AuditEntry {
        id: row.get("id"),
        table_name: row.get("table_name"),
        record_id: row.get("record_id"),
        action: row.get("action"),
        old_data: row.get("old_data"),
        new_data: row.get("new_data"),
        changed_by,
        created_at: row.get("created_at"),
    })
}

use nebula_core::EntityIdType;

/// Actor activity summary backing `GET /audit/actors`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditActorSummary {
    pub changed_by_type: String,
    pub changed_by_id: uuid::Uuid,
    pub change_count: i64,
}

impl Store {
    /// A single audit row by id, used by `revert_entity`'s source lookup.
    pub async fn get_audit_entry(&self, id: uuid::Uuid) -> NebulaResult<Option<AuditEntry>> {
        let client = self.client().await?;
        let sql = self.queries().get("audit/get")?;
        let row = client
            .query_opt(&*sql, &[&id])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        row.as_ref().map(from_row).transpose().map_err(Into::into)
    }

    /// History for one entity, newest first, paginated.
    pub async fn list_entity_history(
        &self,
        entity_id: nebula_core::EntityId,
        limit: i64,
        offset: i64,
    ) -> NebulaResult<Vec<AuditEntry>> {
        let client = self.client().await?;
        let sql = self.queries().get("audit/entity_history")?;
        let rows = client
            .query(&*sql, &[&entity_id.as_uuid().to_string(), &limit, &offset])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        rows.iter()
            .map(from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    /// General audit log listing with optional table/actor filters, newest
    /// first, paginated — backs the admin `GET /audit` route.
    pub async fn query_audit_log(
        &self,
        table_name: Option<&str>,
        changed_by_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> NebulaResult<Vec<AuditEntry>> {
        let client = self.client().await?;
        let sql = self.queries().get("audit/list")?;
        let rows = client
            .query(&*sql, &[&table_name, &changed_by_type, &limit, &offset])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        rows.iter()
            .map(from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    /// Distinct scopes referenced by audit log entries (used by the admin
    /// UI to populate a filter dropdown).
    pub async fn list_audit_scopes(&self) -> NebulaResult<Vec<String>> {
        let client = self.client().await?;
        let sql = self.queries().get("audit/scopes")?;
        let rows = client
            .query(&*sql, &[])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    pub async fn list_audit_actors(
        &self,
        actor_type: Option<&str>,
    ) -> NebulaResult<Vec<AuditActorSummary>> {
        let client = self.client().await?;
        let sql = self.queries().get("audit/actors")?;
        let rows = client
            .query(&*sql, &[&actor_type])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(rows
            .iter()
            .map(|row| AuditActorSummary {
                changed_by_type: row.get("changed_by_type"),
                changed_by_id: row.get("changed_by_id"),
                change_count: row.get("change_count"),
            })
            .collect())
    }
}
