//! Lookup of the human-owner side of a caller.
//!
//! A user id addresses the same `entities` row the rest of the data model
//! uses for a person record; this module only exposes the one read the
//! authenticator needs (the owner's scope set), keeping `UserId` a distinct
//! type from `EntityId` at the type level without duplicating entity CRUD.

use crate::rows::id_vec_col;
use crate::Store;
use nebula_core::{EntityIdType, NebulaResult, ScopeRecordId, StoreError, UserId};

impl Store {
    pub async fn get_user_owner_scopes(
        &self,
        user_id: UserId,
    ) -> NebulaResult<Option<Vec<ScopeRecordId>>> {
        let client = self.client().await?;
        let sql = self.queries().get("users/get_owner_scopes")?;
        let row = client
            .query_opt(&*sql, &[&user_id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.as_ref().map(|r| id_vec_col(r, "scope_ids")))
    }
}
