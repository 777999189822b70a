//! Admin CRUD over the five taxonomy sections (C1). This is the write side
//! of the Enum Registry: inserting a new row, or renaming an existing one,
//! is what an admin does before triggering the reload that republishes a
//! fresh [`crate::RegistryHandle`] snapshot to every reader.
//!
//! Built-in rows (seeded at migration time — `"active"`, `"vault-only"`,
//! `"sensitive"`, ...) can never be renamed; `rename` enforces this with a
//! `WHERE is_builtin = false` guard and turns a zero-rows-affected result
//! into `TaxonomyError::BuiltinImmutable` rather than a silent no-op.

use crate::Store;
use nebula_core::{EntityIdType, NebulaResult, StoreError, TaxonomyError};

pub struct TaxonomyRow<Id> {
    pub id: Id,
    pub name: String,
    pub is_builtin: bool,
}

impl Store {
    async fn create_taxonomy_row<Id>(
        &self,
        query_name: &str,
        name: &str,
    ) -> NebulaResult<TaxonomyRow<Id>>
    where
        Id: EntityIdType,
    {
        let client = self.client().await?;
        let sql = self.queries().get(query_name)?;
        let row = client.query_one(&*sql, &[&name]).await.map_err(|e| {
            match e.as_db_error().and_then(|d| d.constraint()) {
                Some(constraint) => StoreError::UniqueViolation {
                    constraint: constraint.to_string(),
                },
                None => StoreError::QueryFailed {
                    reason: e.to_string(),
                },
            }
        })?;
        Ok(TaxonomyRow {
            id: Id::new(row.get("id")),
            name: row.get("name"),
            is_builtin: row.get("is_builtin"),
        })
    }

    async fn list_taxonomy_rows<Id>(&self, query_name: &str) -> NebulaResult<Vec<TaxonomyRow<Id>>>
    where
        Id: EntityIdType,
    {
        let client = self.client().await?;
        let sql = self.queries().get(query_name)?;
        let rows = client
            .query(&*sql, &[])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(rows
            .into_iter()
            .map(|row| TaxonomyRow {
                id: Id::new(row.get("id")),
                name: row.get("name"),
                is_builtin: row.get("is_builtin"),
            })
            .collect())
    }

    /// Renames a non-built-in row. `TaxonomyError::BuiltinImmutable` if the
    /// row is seeded, `TaxonomyError::Unknown` if the id doesn't exist.
    async fn rename_taxonomy_row<Id>(
        &self,
        query_name: &str,
        label: &'static str,
        id: Id,
        new_name: &str,
    ) -> NebulaResult<()>
    where
        Id: EntityIdType,
    {
        let client = self.client().await?;
        let sql = self.queries().get(query_name)?;
        let updated = client
            .execute(&*sql, &[&id.as_uuid(), &new_name])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 1 {
            return Ok(());
        }
        // Zero rows: either the id doesn't exist, or it does but is
        // built-in (the query's WHERE clause excludes built-ins). Tell
        // them apart with one more read.
        let exists_sql = self.queries().get(&format!("{query_name}_exists"))?;
        let row = client
            .query_opt(&*exists_sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        match row {
            None => Err(TaxonomyError::Unknown {
                label,
                name: id.as_uuid().to_string(),
            }
            .into()),
            Some(row) => Err(TaxonomyError::BuiltinImmutable {
                label,
                name: row.get("name"),
            }
            .into()),
        }
    }

    pub async fn create_status(&self, name: &str) -> NebulaResult<TaxonomyRow<nebula_core::StatusId>> {
        self.create_taxonomy_row("taxonomy/statuses/create", name)
            .await
    }

    pub async fn list_statuses(&self) -> NebulaResult<Vec<TaxonomyRow<nebula_core::StatusId>>> {
        self.list_taxonomy_rows("taxonomy/statuses/list").await
    }

    pub async fn rename_status(&self, id: nebula_core::StatusId, new_name: &str) -> NebulaResult<()> {
        self.rename_taxonomy_row("taxonomy/statuses/rename", "status", id, new_name)
            .await
    }

    pub async fn create_scope(&self, name: &str) -> NebulaResult<TaxonomyRow<nebula_core::ScopeRecordId>> {
        self.create_taxonomy_row("taxonomy/scopes/create", name)
            .await
    }

    pub async fn list_scopes(&self) -> NebulaResult<Vec<TaxonomyRow<nebula_core::ScopeRecordId>>> {
        self.list_taxonomy_rows("taxonomy/scopes/list").await
    }

    pub async fn rename_scope(&self, id: nebula_core::ScopeRecordId, new_name: &str) -> NebulaResult<()> {
        self.rename_taxonomy_row("taxonomy/scopes/rename", "scope", id, new_name)
            .await
    }

    pub async fn create_entity_type(
        &self,
        name: &str,
    ) -> NebulaResult<TaxonomyRow<nebula_core::EntityTypeId>> {
        self.create_taxonomy_row("taxonomy/entity_types/create", name)
            .await
    }

    pub async fn list_entity_types(&self) -> NebulaResult<Vec<TaxonomyRow<nebula_core::EntityTypeId>>> {
        self.list_taxonomy_rows("taxonomy/entity_types/list").await
    }

    pub async fn rename_entity_type(
        &self,
        id: nebula_core::EntityTypeId,
        new_name: &str,
    ) -> NebulaResult<()> {
        self.rename_taxonomy_row("taxonomy/entity_types/rename", "entity type", id, new_name)
            .await
    }

    pub async fn create_relationship_type(
        &self,
        name: &str,
    ) -> NebulaResult<TaxonomyRow<nebula_core::RelationshipTypeId>> {
        self.create_taxonomy_row("taxonomy/relationship_types/create", name)
            .await
    }

    pub async fn list_relationship_types(
        &self,
    ) -> NebulaResult<Vec<TaxonomyRow<nebula_core::RelationshipTypeId>>> {
        self.list_taxonomy_rows("taxonomy/relationship_types/list")
            .await
    }

    pub async fn rename_relationship_type(
        &self,
        id: nebula_core::RelationshipTypeId,
        new_name: &str,
    ) -> NebulaResult<()> {
        self.rename_taxonomy_row(
            "taxonomy/relationship_types/rename",
            "relationship type",
            id,
            new_name,
        )
        .await
    }

    pub async fn create_log_type(&self, name: &str) -> NebulaResult<TaxonomyRow<nebula_core::LogTypeId>> {
        self.create_taxonomy_row("taxonomy/log_types/create", name)
            .await
    }

    pub async fn list_log_types(&self) -> NebulaResult<Vec<TaxonomyRow<nebula_core::LogTypeId>>> {
        self.list_taxonomy_rows("taxonomy/log_types/list").await
    }

    pub async fn rename_log_type(&self, id: nebula_core::LogTypeId, new_name: &str) -> NebulaResult<()> {
        self.rename_taxonomy_row("taxonomy/log_types/rename", "log type", id, new_name)
            .await
    }
}
