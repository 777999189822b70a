//! Relationship CRUD.
//!
//! `source`/`target` are [`NodeRef`] values; the store persists them as a
//! `(source_type, source_id)`/`(target_type, target_id)` column pair and
//! reconstructs the tagged enum on read. `source_id`/`target_id` are TEXT,
//! not uuid — jobs are keyed by their human-readable `YYYYQ#-NNNN` string,
//! so the polymorphic column has to hold either a formatted `Uuid` or a job
//! id verbatim.

use crate::rows::{id_col, metadata_col};
use crate::Store;
use nebula_core::{
    AuditIdentity, EntityIdType, NebulaResult, NodeRef, Relationship, RelationshipId,
    RelationshipTypeId, StatusId, StoreError,
};
use tokio_postgres::Row;

fn node_ref_from_parts(type_name: &str, id: &str) -> Option<NodeRef> {
    Some(match type_name {
        "entity" => NodeRef::Entity(nebula_core::EntityId::new(id.parse().ok()?)),
        "knowledge" => NodeRef::Knowledge(nebula_core::KnowledgeItemId::new(id.parse().ok()?)),
        "log" => NodeRef::Log(nebula_core::LogId::new(id.parse().ok()?)),
        "job" => NodeRef::Job(id.to_string()),
        "agent" => NodeRef::Agent(nebula_core::NebulaAgentId::new(id.parse().ok()?)),
        "file" => NodeRef::File(nebula_core::FileId::new(id.parse().ok()?)),
        "protocol" => NodeRef::Protocol(nebula_core::ProtocolId::new(id.parse().ok()?)),
        _ => return None,
    })
}

fn from_row(row: &Row) -> Result<Relationship, StoreError> {
    let source_id: String = row.get("source_id");
    let target_id: String = row.get("target_id");
    let source = node_ref_from_parts(row.get("source_type"), &source_id).ok_or_else(|| {
        StoreError::QueryFailed {
            reason: format!("unknown source_type {}", row.get::<_, String>("source_type")),
        }
    })?;
    let target = node_ref_from_parts(row.get("target_type"), &target_id).ok_or_else(|| {
        StoreError::QueryFailed {
            reason: format!("unknown target_type {}", row.get::<_, String>("target_type")),
        }
    })?;

    Ok(Relationship {
        id: id_col(row, "id"),
        source,
        target,
        type_id: id_col(row, "type_id"),
        status_id: id_col(row, "status_id"),
        properties: metadata_col(row, "properties"),
    })
}

pub struct NewRelationship {
    pub source: NodeRef,
    pub target: NodeRef,
    pub type_id: RelationshipTypeId,
    pub status_id: StatusId,
    pub properties: serde_json::Value,
}

impl Store {
    pub async fn create_relationship(
        &self,
        new: &NewRelationship,
        identity: AuditIdentity,
    ) -> NebulaResult<Relationship> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("relationships/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.source.type_name(),
                    &new.source.id_key(),
                    &new.target.type_name(),
                    &new.target.id_key(),
                    &new.type_id.as_uuid(),
                    &new.status_id.as_uuid(),
                    &new.properties,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        from_row(&row).map_err(Into::into)
    }

    pub async fn get_relationship(
        &self,
        id: RelationshipId,
    ) -> NebulaResult<Option<Relationship>> {
        let client = self.client().await?;
        let sql = self.queries().get("relationships/get")?;
        let row = client
            .query_opt(&*sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        row.as_ref().map(from_row).transpose().map_err(Into::into)
    }

    /// Used by the `create_relationship` executor's endpoint-existence
    /// check (relationship endpoints must already exist as live records).
    pub async fn node_exists(&self, node: &NodeRef) -> NebulaResult<bool> {
        let client = self.client().await?;
        let sql = self
            .queries()
            .get(&format!("relationships/node_exists_{}", node.type_name()))?;
        let row = client
            .query_one(&*sql, &[&node.id_key()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.get::<_, bool>(0))
    }

    /// Every live relationship with `node` as either endpoint — the basis
    /// for `fileVisibility` and `relationshipEndpointCheck`'s file branch,
    /// neither of which has its own scope to check directly.
    pub async fn find_relationships_touching(
        &self,
        node: &NodeRef,
    ) -> NebulaResult<Vec<Relationship>> {
        let client = self.client().await?;
        let sql = self.queries().get("relationships/find_touching")?;
        let rows = client
            .query(&*sql, &[&node.type_name(), &node.id_key()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        rows.iter()
            .map(from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    pub async fn update_relationship(
        &self,
        id: RelationshipId,
        status_id: Option<StatusId>,
        properties: Option<&serde_json::Value>,
        identity: AuditIdentity,
    ) -> NebulaResult<Relationship> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("relationships/update")?;
        let updated = client
            .execute(
                &*sql,
                &[&id.as_uuid(), &status_id.map(|s| s.as_uuid()), &properties],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                kind: "relationship",
                id: id.as_uuid(),
            }
            .into());
        }
        Ok(self
            .get_relationship(id)
            .await?
            .ok_or(StoreError::NotFound {
                kind: "relationship",
                id: id.as_uuid(),
            })?)
    }
}
