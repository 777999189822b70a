//! Entity CRUD.
//!
//! Callers (the action executors in `nebula-agents`) resolve every name to
//! an id against the enum registry before reaching this module — these
//! methods never see a status/type/scope *name*, only ids.

use crate::rows::{id_col, id_vec_col, ids_to_uuids, metadata_col};
use crate::Store;
use nebula_core::{
    AuditIdentity, BulkOp, Entity, EntityId, EntityIdType, EntityTypeId, NebulaResult,
    ScopeRecordId, StatusId, StoreError,
};
use tokio_postgres::Row;

/// Resolved fields for a new entity, produced by the `create_entity`
/// executor after name -> id resolution and uniqueness checks.
pub struct NewEntity {
    pub name: String,
    pub type_id: EntityTypeId,
    pub status_id: StatusId,
    pub scope_ids: Vec<ScopeRecordId>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub vault_path: Option<String>,
}

fn entity_from_row(row: &Row) -> Entity {
    Entity {
        id: id_col(row, "id"),
        name: row.get("name"),
        type_id: id_col(row, "type_id"),
        status_id: id_col(row, "status_id"),
        scope_ids: id_vec_col(row, "scope_ids"),
        tags: row.get("tags"),
        metadata: metadata_col(row, "metadata"),
        vault_path: row.get("vault_path"),
    }
}

impl Store {
    pub async fn create_entity(
        &self,
        new: &NewEntity,
        identity: AuditIdentity,
    ) -> NebulaResult<Entity> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("entities/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.name,
                    &new.type_id.as_uuid(),
                    &new.status_id.as_uuid(),
                    &ids_to_uuids(&new.scope_ids),
                    &new.tags,
                    &new.metadata,
                    &new.vault_path,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(entity_from_row(&row))
    }

    pub async fn get_entity(&self, id: EntityId) -> NebulaResult<Option<Entity>> {
        let client = self.client().await?;
        let sql = self.queries().get("entities/get")?;
        let row = client
            .query_opt(&*sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(entity_from_row))
    }

    /// Look up by vault path, used by `create_entity`'s hard-fail-on-dup
    /// check before attempting the insert.
    pub async fn find_entity_by_vault_path(&self, path: &str) -> NebulaResult<Option<Entity>> {
        let client = self.client().await?;
        let sql = self.queries().get("entities/get_by_vault_path")?;
        let row = client
            .query_opt(&*sql, &[&path])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(entity_from_row))
    }

    /// Look up by the `(name, type, scope set)` uniqueness key used for
    /// non-vault entities.
    pub async fn find_entity_by_identity(
        &self,
        name: &str,
        type_id: EntityTypeId,
        scope_ids: &[ScopeRecordId],
    ) -> NebulaResult<Option<Entity>> {
        let client = self.client().await?;
        let sql = self.queries().get("entities/get_by_identity")?;
        let row = client
            .query_opt(
                &*sql,
                &[&name, &type_id.as_uuid(), &ids_to_uuids(scope_ids)],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(entity_from_row))
    }

    pub async fn update_entity(
        &self,
        id: EntityId,
        status_id: Option<StatusId>,
        tags: Option<&[String]>,
        metadata: Option<&serde_json::Value>,
        identity: AuditIdentity,
    ) -> NebulaResult<Entity> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("entities/update")?;
        let updated = client
            .execute(
                &*sql,
                &[
                    &id.as_uuid(),
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
                kind: "entity",
                id: id.as_uuid(),
            }
            .into());
        }

        Ok(self
            .get_entity(id)
            .await?
            .ok_or(StoreError::NotFound {
                kind: "entity",
                id: id.as_uuid(),
            })?)
    }

    /// Apply `op` (add/remove/replace) over `tags` for every id in
    /// `entity_ids`, collecting a per-row error instead of aborting the
    /// whole batch on the first miss (spec.md §9's bulk-import error model).
    pub async fn bulk_update_entity_tags(
        &self,
        entity_ids: &[EntityId],
        op: BulkOp,
        tags: &[String],
        identity: AuditIdentity,
    ) -> Vec<(EntityId, NebulaResult<()>)> {
        let mut results = Vec::with_capacity(entity_ids.len());
        for &id in entity_ids {
            let outcome = self.apply_tag_op(id, op, tags, identity).await;
            results.push((id, outcome));
        }
        results
    }

    async fn apply_tag_op(
        &self,
        id: EntityId,
        op: BulkOp,
        tags: &[String],
        identity: AuditIdentity,
    ) -> NebulaResult<()> {
        let existing = self
            .get_entity(id)
            .await?
            .ok_or(StoreError::NotFound {
                kind: "entity",
                id: id.as_uuid(),
            })?;

        let next_tags = match op {
            BulkOp::Add => {
                let mut merged = existing.tags.clone();
                for t in tags {
                    if !merged.contains(t) {
                        merged.push(t.clone());
                    }
                }
                merged
            }
            BulkOp::Remove => existing
                .tags
                .iter()
                .filter(|t| !tags.contains(t))
                .cloned()
                .collect(),
            BulkOp::Replace => tags.to_vec(),
        };

        self.update_entity(id, None, Some(&next_tags), None, identity)
            .await
            .map(|_| ())
    }

    pub async fn bulk_update_entity_scopes(
        &self,
        entity_ids: &[EntityId],
        op: BulkOp,
        scope_ids: &[ScopeRecordId],
        identity: AuditIdentity,
    ) -> Vec<(EntityId, NebulaResult<()>)> {
        let mut results = Vec::with_capacity(entity_ids.len());
        for &id in entity_ids {
            let outcome = self.apply_scope_op(id, op, scope_ids, identity).await;
            results.push((id, outcome));
        }
        results
    }

    async fn apply_scope_op(
        &self,
        id: EntityId,
        op: BulkOp,
        scope_ids: &[ScopeRecordId],
        identity: AuditIdentity,
    ) -> NebulaResult<()> {
        let existing = self
            .get_entity(id)
            .await?
            .ok_or(StoreError::NotFound {
                kind: "entity",
                id: id.as_uuid(),
            })?;

        let next_scopes: Vec<ScopeRecordId> = match op {
            BulkOp::Add => {
                let mut merged = existing.scope_ids.clone();
                for s in scope_ids {
                    if !merged.contains(s) {
                        merged.push(*s);
                    }
                }
                merged
            }
            BulkOp::Remove => existing
                .scope_ids
                .iter()
                .filter(|s| !scope_ids.contains(s))
                .copied()
                .collect(),
            BulkOp::Replace => scope_ids.to_vec(),
        };

        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("entities/update_scopes")?;
        let updated = client
            .execute(&*sql, &[&id.as_uuid(), &ids_to_uuids(&next_scopes)])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                kind: "entity",
                id: id.as_uuid(),
            }
            .into());
        }
        Ok(())
    }

    /// Batched `(id, scope_ids)` lookup backing the scope mediator's
    /// `entityWriteAccess` check — one round trip regardless of how many
    /// ids the caller asks about. Ids absent from the result don't exist.
    pub async fn scope_ids_for_entities(
        &self,
        ids: &[EntityId],
    ) -> NebulaResult<Vec<(EntityId, Vec<ScopeRecordId>)>> {
        let client = self.client().await?;
        let sql = self.queries().get("entities/scope_ids_for")?;
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

    /// Snapshot replay for `revert_entity`: apply a prior audit row's full
    /// field set back onto the live entity. `audit_row_id` identifies the
    /// snapshot to replay; the SQL side verifies it actually belongs to
    /// `id` and returns the mismatch as zero rows affected.
    pub async fn revert_entity(
        &self,
        id: EntityId,
        audit_row_id: uuid::Uuid,
        identity: AuditIdentity,
    ) -> NebulaResult<Entity> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("entities/revert")?;
        let updated = client
            .execute(&*sql, &[&id.as_uuid(), &audit_row_id])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(nebula_core::ExecutorError::RevertMismatch.into());
        }
        Ok(self
            .get_entity(id)
            .await?
            .ok_or(StoreError::NotFound {
                kind: "entity",
                id: id.as_uuid(),
            })?)
    }
}
