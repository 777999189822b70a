//! Shared row <-> model conversion helpers used across the per-entity CRUD
//! modules. Keeps `tokio_postgres::Row::get` calls and id-newtype wrapping
//! in one place instead of repeated inline in every query module.

use nebula_core::EntityIdType;
use tokio_postgres::Row;
use uuid::Uuid;

/// Read a typed id column, wrapping the raw `Uuid` Postgres hands back.
pub fn id_col<Id: EntityIdType>(row: &Row, col: &str) -> Id {
    Id::new(row.get::<_, Uuid>(col))
}

/// Read an optional typed id column.
pub fn opt_id_col<Id: EntityIdType>(row: &Row, col: &str) -> Option<Id> {
    row.get::<_, Option<Uuid>>(col).map(Id::new)
}

/// Read a `uuid[]` column as a `Vec` of typed ids.
pub fn id_vec_col<Id: EntityIdType>(row: &Row, col: &str) -> Vec<Id> {
    row.get::<_, Vec<Uuid>>(col).into_iter().map(Id::new).collect()
}

/// Read a `jsonb` column, defaulting to `Value::Null` absent representation
/// to an empty object so callers never have to special-case null metadata.
pub fn metadata_col(row: &Row, col: &str) -> serde_json::Value {
    row.get::<_, Option<serde_json::Value>>(col)
        .unwrap_or(serde_json::Value::Null)
}

/// Flatten a list of typed ids into the raw `Uuid`s `tokio-postgres` knows
/// how to bind as a `uuid[]` parameter.
pub fn ids_to_uuids<Id: EntityIdType>(ids: &[Id]) -> Vec<Uuid> {
    ids.iter().map(EntityIdType::as_uuid).collect()
}
