//! Log CRUD.

use crate::rows::{id_col, metadata_col};
use crate::Store;
use nebula_core::{
    AuditIdentity, EntityIdType, Log, LogId, LogTypeId, NebulaResult, StatusId, StoreError,
    Timestamp,
};
use tokio_postgres::Row;

pub struct NewLog {
    pub log_type_id: LogTypeId,
    pub timestamp: Timestamp,
    pub value: serde_json::Value,
    pub status_id: StatusId,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
}

fn from_row(row: &Row) -> Log {
    Log {
        id: id_col(row, "id"),
        log_type_id: id_col(row, "log_type_id"),
        timestamp: row.get("timestamp"),
        value: metadata_col(row, "value"),
        status_id: id_col(row, "status_id"),
        tags: row.get("tags"),
        metadata: metadata_col(row, "metadata"),
    }
}

impl Store {
    pub async fn create_log(&self, new: &NewLog, identity: AuditIdentity) -> NebulaResult<Log> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("logs/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.log_type_id.as_uuid(),
                    &new.timestamp,
                    &new.value,
                    &new.status_id.as_uuid(),
                    &new.tags,
                    &new.metadata,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(from_row(&row))
    }

    pub async fn get_log(&self, id: LogId) -> NebulaResult<Option<Log>> {
        let client = self.client().await?;
        let sql = self.queries().get("logs/get")?;
        let row = client
            .query_opt(&*sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(from_row))
    }

    pub async fn update_log(
        &self,
        id: LogId,
        value: Option<&serde_json::Value>,
        status_id: Option<StatusId>,
        tags: Option<&[String]>,
        identity: AuditIdentity,
    ) -> NebulaResult<Log> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("logs/update")?;
        let updated = client
            .execute(
                &*sql,
                &[&id.as_uuid(), &value, &status_id.map(|s| s.as_uuid()), &tags],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                kind: "log",
                id: id.as_uuid(),
            }
            .into());
        }
        Ok(self.get_log(id).await?.ok_or(StoreError::NotFound {
            kind: "log",
            id: id.as_uuid(),
        })?)
    }
}
