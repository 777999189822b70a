//! Nebula Storage — connection pool, query catalog, enum registry loader,
//! and per-entity persistence.
//!
//! This crate is the only one that touches `tokio-postgres` directly. Every
//! other crate calls through [`Store`] with resolved ids; name resolution
//! against the taxonomy happens one layer up, against the [`RegistryHandle`]
//! snapshot this crate loads and swaps.
//!
//! `event_dag.rs`, `hybrid_dag.rs`, `async_trait.rs` remain on disk from the
//! prior incarnation of this crate (a hybrid in-memory/LMDB event DAG) but
//! are not part of the module tree below — nothing in Nebula's data model
//! needs an event DAG. They are pending deletion in the final trim; see
//! DESIGN.md.

mod agents;
mod approvals;
mod audit_log;
mod entities;
mod enrollment;
mod files;
mod jobs;
mod keys;
mod knowledge;
mod logs;
mod pool;
mod protocols;
mod queries;
mod registry;
mod relationships;
mod rows;
mod taxonomy;
mod users;

pub use agents::NewAgent;
pub use approvals::NewApprovalRequest;
pub use audit_log::AuditActorSummary;
pub use enrollment::NewEnrollmentSession;
pub use entities::NewEntity;
pub use files::NewFile;
pub use jobs::NewJob;
pub use keys::NewApiKey;
pub use knowledge::NewKnowledgeItem;
pub use protocols::NewProtocol;
pub use relationships::NewRelationship;

pub use pool::{DbConfig, Pool};
pub use queries::QueryCatalog;
pub use registry::{load_enum_registry, RegistryHandle};

use nebula_core::{AuditIdentity, EntityIdType, NebulaResult, StoreError};
use std::sync::Arc;

/// The shared persistence handle every other crate depends on. Cheap to
/// clone — the pool and query catalog are both internally `Arc`-backed.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
    queries: Arc<QueryCatalog>,
}

impl Store {
    pub fn new(pool: Pool, queries: Arc<QueryCatalog>) -> Self {
        Self { pool, queries }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn queries(&self) -> &QueryCatalog {
        &self.queries
    }

    async fn client(&self) -> NebulaResult<deadpool_postgres::Client> {
        self.pool.get().await.map_err(|e| {
            StoreError::PoolUnavailable {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// A connection with `app.changed_by_type`/`app.changed_by_id` bound for
    /// the lifetime of this checkout, so the audit-log trigger on the
    /// mutation issued right after can attribute the row. Mirrors the
    /// source's `SELECT set_config('app.changed_by_type', ...)` pair, issued
    /// on the same connection immediately before the mutating statement.
    async fn audited_client(
        &self,
        identity: AuditIdentity,
    ) -> NebulaResult<deadpool_postgres::Client> {
        let client = self.client().await?;
        let (type_str, id_str) = match identity {
            // A user is an entities-table row, not a distinct kind — the
            // source writes 'entity' for reviewer/user callers everywhere.
            AuditIdentity::User(id) => ("entity", id.as_uuid().to_string()),
            AuditIdentity::Agent(id) => ("agent", id.as_uuid().to_string()),
        };
        client
            .execute(
                "SELECT set_config('app.changed_by_type', $1, false)",
                &[&type_str],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        client
            .execute(
                "SELECT set_config('app.changed_by_id', $1, false)",
                &[&id_str],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(client)
    }
}
