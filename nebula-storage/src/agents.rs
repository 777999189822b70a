//! Agent CRUD.
//!
//! Agents are created in the `inactive` status by `register_agent`'s
//! approval proposal and only gain write access once an admin approves the
//! registration (see `nebula-approvals`'s `activate_agent`, which flips the
//! status and applies any reviewer grants in the same row).

use crate::rows::id_vec_col;
use crate::Store;
use nebula_core::{
    Agent, AuditIdentity, EntityIdType, NebulaAgentId, NebulaResult, ScopeRecordId, StatusId,
    StoreError,
};
use tokio_postgres::Row;

fn from_row(row: &Row) -> Agent {
    Agent {
        id: crate::rows::id_col(row, "id"),
        name: row.get("name"),
        description: row.get("description"),
        owner_scope_ids: id_vec_col(row, "scope_ids"),
        capabilities: row.get("capabilities"),
        requires_approval: row.get("requires_approval"),
        status_id: crate::rows::id_col(row, "status_id"),
    }
}

pub struct NewAgent {
    pub name: String,
    pub description: Option<String>,
    pub scope_ids: Vec<ScopeRecordId>,
    pub capabilities: Vec<String>,
    pub status_id: StatusId,
    pub requires_approval: bool,
}

impl Store {
    /// Name-uniqueness check `register_agent` runs before inserting.
    pub async fn find_agent_by_name(&self, name: &str) -> NebulaResult<Option<Agent>> {
        let client = self.client().await?;
        let sql = self.queries().get("agents/check_name")?;
        let row = client
            .query_opt(&*sql, &[&name])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(from_row))
    }

    pub async fn create_agent(&self, new: &NewAgent) -> NebulaResult<Agent> {
        let client = self.client().await?;
        let sql = self.queries().get("agents/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.name,
                    &new.description,
                    &crate::rows::ids_to_uuids(&new.scope_ids),
                    &new.capabilities,
                    &new.status_id.as_uuid(),
                    &new.requires_approval,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(from_row(&row))
    }

    pub async fn get_agent(&self, id: NebulaAgentId) -> NebulaResult<Option<Agent>> {
        let client = self.client().await?;
        let sql = self.queries().get("agents/get_by_id")?;
        let row = client
            .query_opt(&*sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(from_row))
    }

    pub async fn get_agent_by_name(&self, name: &str) -> NebulaResult<Option<Agent>> {
        let client = self.client().await?;
        let sql = self.queries().get("agents/get_info")?;
        let row = client
            .query_opt(&*sql, &[&name])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(from_row))
    }

    /// `status_category` filters by the taxonomy category column ("active",
    /// "inactive", ...), not a single status id — matching the source
    /// route's `status_category: str = "active"` query parameter.
    pub async fn list_agents(&self, status_category: &str) -> NebulaResult<Vec<Agent>> {
        let client = self.client().await?;
        let sql = self.queries().get("agents/list")?;
        let rows = client
            .query(&*sql, &[&status_category])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(rows.iter().map(from_row).collect())
    }

    pub async fn update_agent(
        &self,
        id: NebulaAgentId,
        description: Option<&str>,
        requires_approval: Option<bool>,
        scope_ids: Option<&[ScopeRecordId]>,
    ) -> NebulaResult<Agent> {
        let client = self.client().await?;
        let sql = self.queries().get("agents/update")?;
        let scope_uuids = scope_ids.map(crate::rows::ids_to_uuids);
        let row = client
            .query_opt(
                &*sql,
                &[&id.as_uuid(), &description, &requires_approval, &scope_uuids],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        row.as_ref().map(from_row).ok_or(
            StoreError::NotFound {
                kind: "agent",
                id: id.as_uuid(),
            }
            .into(),
        )
    }

    /// Activates a pending agent, applying reviewer grants in place of the
    /// originally requested scopes/`requires_approval` when given. Runs in
    /// the same transaction as the approval resolution that triggers it.
    pub async fn activate_agent(
        &self,
        id: NebulaAgentId,
        active_status_id: StatusId,
        grant_scope_ids: Option<&[ScopeRecordId]>,
        grant_requires_approval: Option<bool>,
        identity: AuditIdentity,
    ) -> NebulaResult<Agent> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("agents/activate")?;
        let scope_uuids = grant_scope_ids.map(crate::rows::ids_to_uuids);
        let row = client
            .query_opt(
                &*sql,
                &[
                    &id.as_uuid(),
                    &active_status_id.as_uuid(),
                    &scope_uuids,
                    &grant_requires_approval,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        row.as_ref().map(from_row).ok_or(
            StoreError::NotFound {
                kind: "agent",
                id: id.as_uuid(),
            }
            .into(),
        )
    }
}
