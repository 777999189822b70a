//! Store-assisted scope checks: `entityWriteAccess`, `jobOwnership`,
//! `fileVisibility`, `relationshipEndpointCheck`.

use crate::has_write_scopes;
use nebula_core::{Caller, EntityId, FileId, KnowledgeItemId, NebulaResult, NodeRef, ScopeError};
use nebula_storage::{RegistryHandle, Store};
use std::collections::HashSet;

fn scope_names(registry: &RegistryHandle, scope_ids: &[nebula_core::ScopeRecordId]) -> HashSet<String> {
    let registry = registry.current();
    scope_ids
        .iter()
        .filter_map(|id| registry.scope_name_of(*id))
        .map(str::to_string)
        .collect()
}

/// `entityWriteAccess(caller, [entityIds]) -> Ok | NotFound | Forbidden`.
/// One batched scope lookup regardless of how many ids are asked about.
pub async fn entity_write_access(
    store: &Store,
    registry: &RegistryHandle,
    caller: &Caller,
    entity_ids: &[EntityId],
) -> NebulaResult<()> {
    let found = store.scope_ids_for_entities(entity_ids).await?;
    if found.len() != entity_ids.len() {
        return Err(ScopeError::NotFound.into());
    }
    let caller_scopes = caller.effective_scope_names();
    for (_, scope_ids) in &found {
        let record_scopes = scope_names(registry, scope_ids);
        if !has_write_scopes(caller_scopes, &record_scopes) {
            return Err(ScopeError::Forbidden.into());
        }
    }
    Ok(())
}

/// Knowledge items follow the same scope-subset rule as entities.
pub async fn knowledge_write_access(
    store: &Store,
    registry: &RegistryHandle,
    caller: &Caller,
    knowledge_ids: &[KnowledgeItemId],
) -> NebulaResult<()> {
    let found = store.scope_ids_for_knowledge(knowledge_ids).await?;
    if found.len() != knowledge_ids.len() {
        return Err(ScopeError::NotFound.into());
    }
    let caller_scopes = caller.effective_scope_names();
    for (_, scope_ids) in &found {
        let record_scopes = scope_names(registry, scope_ids);
        if !has_write_scopes(caller_scopes, &record_scopes) {
            return Err(ScopeError::Forbidden.into());
        }
    }
    Ok(())
}

/// `jobOwnership(caller, jobId) -> Ok | Forbidden` — agent callers may only
/// touch jobs whose `agentId` equals theirs; users (and the bootstrap
/// caller, which no mutating tool ever reaches) pass unconditionally.
pub async fn job_ownership(store: &Store, caller: &Caller, job_id: &str) -> NebulaResult<()> {
    let Some(agent_id) = caller.agent_id() else {
        return Ok(());
    };
    let job = store
        .get_job(job_id)
        .await?
        .ok_or(ScopeError::NotFound)?;
    if job.agent_id == Some(agent_id) {
        Ok(())
    } else {
        Err(ScopeError::JobNotOwned {
            job_id: job_id.to_string(),
        }
        .into())
    }
}

/// `fileVisibility(caller, fileId) -> bool` — a file with no attachments is
/// public; otherwise every attached entity/knowledge node must pass
/// `hasWriteScopes` and every attached job must be owned by the caller.
pub async fn file_visibility(
    store: &Store,
    registry: &RegistryHandle,
    caller: &Caller,
    file_id: FileId,
) -> NebulaResult<bool> {
    let node = NodeRef::File(file_id);
    let touching = store.find_relationships_touching(&node).await?;
    if touching.is_empty() {
        return Ok(true);
    }

    for rel in &touching {
        let other = if rel.source == node { &rel.target } else { &rel.source };
        let visible = match other {
            NodeRef::Entity(id) => {
                entity_write_access(store, registry, caller, std::slice::from_ref(id))
                    .await
                    .is_ok()
            }
            NodeRef::Knowledge(id) => {
                knowledge_write_access(store, registry, caller, std::slice::from_ref(id))
                    .await
                    .is_ok()
            }
            NodeRef::Job(id) => job_ownership(store, caller, id).await.is_ok(),
            // Other node kinds carry no scope of their own; their presence
            // doesn't restrict visibility beyond what their own endpoint
            // check already enforces elsewhere.
            _ => true,
        };
        if !visible {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `relationshipEndpointCheck(caller, nodeType, nodeId) -> Ok | NotFound |
/// Forbidden` — dispatches to the visibility rule for the node's own kind.
pub async fn relationship_endpoint_check(
    store: &Store,
    registry: &RegistryHandle,
    caller: &Caller,
    node: &NodeRef,
) -> NebulaResult<()> {
    match node {
        NodeRef::Entity(id) => entity_write_access(store, registry, caller, std::slice::from_ref(id)).await,
        NodeRef::Knowledge(id) => {
            knowledge_write_access(store, registry, caller, std::slice::from_ref(id)).await
        }
        NodeRef::Job(id) => job_ownership(store, caller, id).await,
        NodeRef::File(id) => {
            if file_visibility(store, registry, caller, *id).await? {
                Ok(())
            } else {
                Err(ScopeError::Forbidden.into())
            }
        }
        // Logs, agents, and protocols carry no scope of their own in this
        // model; existence is the only precondition, already checked by
        // `Store::node_exists` before this runs.
        NodeRef::Log(_) | NodeRef::Agent(_) | NodeRef::Protocol(_) => Ok(()),
    }
}
