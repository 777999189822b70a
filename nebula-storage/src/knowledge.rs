//! Knowledge item CRUD.

use crate::rows::{id_col, id_vec_col, ids_to_uuids, metadata_col};
use crate::Store;
use nebula_core::{
    AuditIdentity, EntityIdType, KnowledgeItem, KnowledgeItemId, NebulaResult, ScopeRecordId,
    StatusId, StoreError,
};
use tokio_postgres::Row;

pub struct NewKnowledgeItem {
    pub title: String,
    pub url: Option<String>,
    pub source_type: String,
    pub content: Option<String>,
    pub scope_ids: Vec<ScopeRecordId>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub status_id: StatusId,
}

fn from_row(row: &Row) -> KnowledgeItem {
    KnowledgeItem {
        id: id_col(row, "id"),
        title: row.get("title"),
        url: row.get("url"),
        source_type: row.get("source_type"),
        content: row.get("content"),
        scope_ids: id_vec_col(row, "scope_ids"),
        tags: row.get("tags"),
        metadata: metadata_col(row, "metadata"),
        status_id: id_col(row, "status_id"),
    }
}

impl Store {
    pub async fn create_knowledge(
        &self,
        new: &NewKnowledgeItem,
        identity: AuditIdentity,
    ) -> NebulaResult<KnowledgeItem> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("knowledge/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.title,
                    &new.url,
                    &new.source_type,
                    &new.content,
                    &ids_to_uuids(&new.scope_ids),
                    &new.tags,
                    &new.metadata,
                    &new.status_id.as_uuid(),
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(from_row(&row))
    }

    pub async fn get_knowledge(&self, id: KnowledgeItemId) -> NebulaResult<Option<KnowledgeItem>> {
        let client = self.client().await?;
        let sql = self.queries().get("knowledge/get")?;
        let row = client
            .query_opt(&*sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(from_row))
    }

    /// Look up by URL, used by `create_knowledge`'s hard-fail-on-dup check.
    pub async fn find_knowledge_by_url(&self, url: &str) -> NebulaResult<Option<KnowledgeItem>> {
        let client = self.client().await?;
        let sql = self.queries().get("knowledge/get_by_url")?;
        let row = client
            .query_opt(&*sql, &[&url])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(from_row))
    }

    /// Batched `(id, scope_ids)` lookup, the knowledge-item counterpart of
    /// `Store::scope_ids_for_entities`.
    pub async fn scope_ids_for_knowledge(
        &self,
        ids: &[KnowledgeItemId],
    ) -> NebulaResult<Vec<(KnowledgeItemId, Vec<ScopeRecordId>)>> {
        let client = self.client().await?;
        let sql = self.queries().get("knowledge/scope_ids_for")?;
        let rows = client
            .query(&*sql, &[&ids_to_uuids(ids)])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(rows
            .iter()
            .map(|row| (id_col(row, "id"), id_vec_col(row, "scope_ids")))
            .collect())
    }

    pub async fn update_knowledge(
        &self,
        id: KnowledgeItemId,
        title: Option<&str>,
        content: Option<&str>,
        status_id: Option<StatusId>,
        tags: Option<&[String]>,
        metadata: Option<&serde_json::Value>,
        identity: AuditIdentity,
    ) -> NebulaResult<KnowledgeItem> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("knowledge/update")?;
        let updated = client
            .execute(
                &*sql,
                &[
                    &id.as_uuid(),
                    &title,
                    &content,
                    &status_id.map(|s| s.as_uuid()),
                    &tags,
                    &metadata,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                kind: "knowledge_item",
                id: id.as_uuid(),
            }
            .into());
        }
        Ok(self
            .get_knowledge(id)
            .await?
            .ok_or(StoreError::NotFound {
                kind: "knowledge_item",
                id: id.as_uuid(),
            })?)
    }
}
