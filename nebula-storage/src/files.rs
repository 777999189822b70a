//! File metadata CRUD. Nebula stores file *metadata*; the bytes live
//! wherever `file_path` points (spec.md's Non-goals exclude object storage
//! integration from this crate's scope).

use crate::rows::{id_col, metadata_col};
use crate::Store;
use nebula_core::{AuditIdentity, EntityIdType, FileId, NebulaFile, NebulaResult, StatusId, StoreError};
use tokio_postgres::Row;

pub struct NewFile {
    pub filename: String,
    pub file_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub checksum: Option<String>,
    pub status_id: StatusId,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
}

fn from_row(row: &Row) -> NebulaFile {
    NebulaFile {
        id: id_col(row, "id"),
        filename: row.get("filename"),
        file_path: row.get("file_path"),
        mime_type: row.get("mime_type"),
        size_bytes: row.get("size_bytes"),
        checksum: row.get("checksum"),
        status_id: id_col(row, "status_id"),
        tags: row.get("tags"),
        metadata: metadata_col(row, "metadata"),
    }
}

impl Store {
    pub async fn create_file(
        &self,
        new: &NewFile,
        identity: AuditIdentity,
    ) -> NebulaResult<NebulaFile> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("files/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.filename,
                    &new.file_path,
                    &new.mime_type,
                    &new.size_bytes,
                    &new.checksum,
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

    pub async fn get_file(&self, id: FileId) -> NebulaResult<Option<NebulaFile>> {
        let client = self.client().await?;
        let sql = self.queries().get("files/get")?;
        let row = client
            .query_opt(&*sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(from_row))
    }

    pub async fn update_file(
        &self,
        id: FileId,
        status_id: Option<StatusId>,
        tags: Option<&[String]>,
        metadata: Option<&serde_json::Value>,
        identity: AuditIdentity,
    ) -> NebulaResult<NebulaFile> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("files/update")?;
        let updated = client
            .execute(
                &*sql,
                &[&id.as_uuid(), &status_id.map(|s| s.as_uuid()), &tags, &metadata],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                kind: "file",
                id: id.as_uuid(),
            }
            .into());
        }
        Ok(self.get_file(id).await?.ok_or(StoreError::NotFound {
            kind: "file",
            id: id.as_uuid(),
        })?)
    }
}
