//! Action Executor Registry (C6).
//!
//! Implements `nebula_approvals::ApprovalExecutor`, dispatching an approved
//! action by name to the matching function in [`executors`]. Kept as its
//! own crate (rather than folded into `nebula-approvals`) so the approval
//! engine and the executors can be tested and versioned independently —
//! they only meet through the trait object at the `nebula-api` wiring
//! layer. Grounded on `nebula_mcp/executors.py`'s `EXECUTORS` dispatch
//! table; `register_agent` is the one action from that table absent here
//! (it lives in `nebula-approvals::approve_register_agent` instead, since
//! it mutates the `agents` table rather than one of the resource tables
//! these executors mediate).

mod executors;
mod metadata;
mod sanitize;

pub use metadata::validate_entity_metadata;

use nebula_approvals::ApprovalExecutor;
use nebula_core::{AuditIdentity, EntityIdType, ExecutorError, NebulaResult};
use nebula_storage::{RegistryHandle, Store};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct ExecutorRegistry {
    store: Store,
    registry: Arc<RegistryHandle>,
}

impl ExecutorRegistry {
    pub fn new(store: Store, registry: Arc<RegistryHandle>) -> Self {
        Self { store, registry }
    }
}

fn parse_payload<T: DeserializeOwned>(payload: &serde_json::Value) -> NebulaResult<T> {
    serde_json::from_value(payload.clone()).map_err(|e| {
        ExecutorError::Invalid {
            reason: format!("malformed action payload: {e}"),
        }
        .into()
    })
}

fn as_outcome(
    id: impl Into<String>,
    result: &impl Serialize,
) -> NebulaResult<(String, serde_json::Value)> {
    let value = serde_json::to_value(result).map_err(|e| ExecutorError::Invalid {
        reason: e.to_string(),
    })?;
    Ok((id.into(), value))
}

#[async_trait::async_trait]
impl ApprovalExecutor for ExecutorRegistry {
    async fn execute(
        &self,
        action: &str,
        payload: &serde_json::Value,
        reviewer: AuditIdentity,
    ) -> NebulaResult<(String, serde_json::Value)> {
        let registry = self.registry.current();

        match action {
            "create_entity" => {
                let input = parse_payload(payload)?;
                let entity =
                    executors::create_entity(&self.store, &registry, input, reviewer).await?;
                as_outcome(entity.id.as_uuid().to_string(), &entity)
            }
            "update_entity" => {
                let input = parse_payload(payload)?;
                let entity =
                    executors::update_entity(&self.store, &registry, input, reviewer).await?;
                as_outcome(entity.id.as_uuid().to_string(), &entity)
            }
            "create_knowledge" => {
                let input = parse_payload(payload)?;
                let item =
                    executors::create_knowledge(&self.store, &registry, input, reviewer).await?;
                as_outcome(item.id.as_uuid().to_string(), &item)
            }
            "update_knowledge" => {
                let input = parse_payload(payload)?;
                let item =
                    executors::update_knowledge(&self.store, &registry, input, reviewer).await?;
                as_outcome(item.id.as_uuid().to_string(), &item)
            }
            "create_relationship" => {
                let input = parse_payload(payload)?;
                let rel =
                    executors::create_relationship(&self.store, &registry, input, reviewer)
                        .await?;
                as_outcome(rel.id.as_uuid().to_string(), &rel)
            }
            "update_relationship" => {
                let input = parse_payload(payload)?;
                let rel =
                    executors::update_relationship(&self.store, &registry, input, reviewer)
                        .await?;
                as_outcome(rel.id.as_uuid().to_string(), &rel)
            }
            "create_job" => {
                let input = parse_payload(payload)?;
                let job =
                    executors::create_job(&self.store, &registry, input, reviewer).await?;
                as_outcome(job.id.clone(), &job)
            }
            "update_job" => {
                let input = parse_payload(payload)?;
                let job = executors::update_job(&self.store, input, reviewer).await?;
                as_outcome(job.id.clone(), &job)
            }
            "update_job_status" => {
                let input = parse_payload(payload)?;
                let job =
                    executors::update_job_status(&self.store, &registry, input, reviewer).await?;
                as_outcome(job.id.clone(), &job)
            }
            "create_log" => {
                let input = parse_payload(payload)?;
                let log =
                    executors::create_log(&self.store, &registry, input, reviewer).await?;
                as_outcome(log.id.as_uuid().to_string(), &log)
            }
            "update_log" => {
                let input = parse_payload(payload)?;
                let log =
                    executors::update_log(&self.store, &registry, input, reviewer).await?;
                as_outcome(log.id.as_uuid().to_string(), &log)
            }
            "create_file" => {
                let input = parse_payload(payload)?;
                let file =
                    executors::create_file(&self.store, &registry, input, reviewer).await?;
                as_outcome(file.id.as_uuid().to_string(), &file)
            }
            "update_file" => {
                let input = parse_payload(payload)?;
                let file =
                    executors::update_file(&self.store, &registry, input, reviewer).await?;
                as_outcome(file.id.as_uuid().to_string(), &file)
            }
            "create_protocol" => {
                let input = parse_payload(payload)?;
                let protocol =
                    executors::create_protocol(&self.store, &registry, input, reviewer).await?;
                as_outcome(protocol.id.as_uuid().to_string(), &protocol)
            }
            "update_protocol" => {
                let input = parse_payload(payload)?;
                let protocol =
                    executors::update_protocol(&self.store, &registry, input, reviewer).await?;
                as_outcome(protocol.id.as_uuid().to_string(), &protocol)
            }
            "bulk_update_entity_tags" => {
                let input = parse_payload(payload)?;
                let summary =
                    executors::bulk_update_entity_tags(&self.store, input, reviewer).await?;
                as_outcome("bulk", &summary)
            }
            "bulk_update_entity_scopes" => {
                let input = parse_payload(payload)?;
                let summary = executors::bulk_update_entity_scopes(
                    &self.store,
                    &registry,
                    input,
                    reviewer,
                )
                .await?;
                as_outcome("bulk", &summary)
            }
            "revert_entity" => {
                let input = parse_payload(payload)?;
                let entity = executors::revert_entity(&self.store, input, reviewer).await?;
                as_outcome(entity.id.as_uuid().to_string(), &entity)
            }
            other => Err(ExecutorError::Invalid {
                reason: format!("unknown action: {other}"),
            }
            .into()),
        }
    }
}
