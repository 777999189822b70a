//! Protocol CRUD.

use crate::rows::{id_col, id_vec_col, ids_to_uuids, metadata_col};
use crate::Store;
use nebula_core::{
    AuditIdentity, EntityIdType, NebulaResult, Protocol, ProtocolId, ScopeRecordId, StatusId,
    StoreError,
};
use tokio_postgres::Row;

pub struct NewProtocol {
    pub name: String,
    pub description: Option<String>,
    pub scope_ids: Vec<ScopeRecordId>,
    pub status_id: StatusId,
    pub metadata: serde_json::Value,
}

fn from_row(row: &Row) -> Protocol {
    Protocol {
        id: id_col(row, "id"),
        name: row.get("name"),
        description: row.get("description"),
        scope_ids: id_vec_col(row, "scope_ids"),
        status_id: id_col(row, "status_id"),
        metadata: metadata_col(row, "metadata"),
    }
}

impl Store {
    pub async fn create_protocol(
        &self,
        new: &NewProtocol,
        identity: AuditIdentity,
    ) -> NebulaResult<Protocol> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("protocols/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.name,
                    &new.description,
                    &ids_to_uuids(&new.scope_ids),
                    &new.status_id.as_uuid(),
                    &new.metadata,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(from_row(&row))
    }

    pub async fn get_protocol(&self, id: ProtocolId) -> NebulaResult<Option<Protocol>> {
        let client = self.client().await?;
        let sql = self.queries().get("protocols/get")?;
        let row = client
            .query_opt(&*sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(from_row))
    }

    pub async fn update_protocol(
        &self,
        id: ProtocolId,
        description: Option<&str>,
        status_id: Option<StatusId>,
        metadata: Option<&serde_json::Value>,
        identity: AuditIdentity,
    ) -> NebulaResult<Protocol> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("protocols/update")?;
        let updated = client
            .execute(
                &*sql,
                &[
                    &id.as_uuid(),
                    &description,
                    &status_id.map(|s| s.as_uuid()),
                    &metadata,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                kind: "protocol",
                id: id.as_uuid(),
            }
            .into());
        }
        Ok(self.get_protocol(id).await?.ok_or(StoreError::NotFound {
            kind: "protocol",
            id: id.as_uuid(),
        })?)
    }
}
