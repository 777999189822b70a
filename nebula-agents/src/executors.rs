//! The 18 action executors run once an approval has flipped to `approved`
//! (`register_agent` is the 19th action; it's implemented directly in
//! `nebula-approvals` since it mutates the `agents` table, not one of the
//! resource tables here). Each function mirrors one `execute_*` function in
//! `nebula_mcp/executors.py`: resolve enum names against the registry,
//! run whatever dedup/uniqueness check the original does, validate
//! metadata, then call the matching `Store` method under the approving
//! reviewer's audit identity.

use crate::metadata::validate_entity_metadata;
use crate::sanitize::{sanitize_metadata, sanitize_tags, sanitize_text, sanitize_vault_path};
use nebula_core::{
    AuditIdentity, CreateEntityInput, CreateFileInput, CreateJobInput,
    CreateKnowledgeInput, CreateLogInput, CreateProtocolInput, CreateRelationshipInput, Entity,
    EntityIdType, EnumRegistry, ExecutorError, Job, KnowledgeItem, Log, NebulaFile, NebulaResult,
    Protocol, Relationship, RevertEntityInput, Timestamp, UpdateEntityInput, UpdateFileInput,
    UpdateJobInput, UpdateJobStatusInput, UpdateKnowledgeInput, UpdateLogInput,
    UpdateProtocolInput, UpdateRelationshipInput,
};
use nebula_storage::{
    NewEntity, NewFile, NewJob, NewKnowledgeItem, NewProtocol, NewRelationship, Store,
};

fn conflict(kind: &str, reason: String) -> nebula_core::NebulaError {
    ExecutorError::Conflict {
        kind: kind.to_string(),
        reason,
    }
    .into()
}

fn invalid(reason: impl Into<String>) -> nebula_core::NebulaError {
    ExecutorError::Invalid {
        reason: reason.into(),
    }
    .into()
}

/// The `context_segments` privacy check `create_entity` runs once metadata
/// is validated: every segment must name at least one scope, every named
/// scope must be a known taxonomy scope, and every named scope must also be
/// one of the entity's own scopes (a segment can't carry a looser scope
/// than its parent entity).
fn validate_context_segments(
    registry: &EnumRegistry,
    metadata: &serde_json::Value,
    entity_scopes: &[String],
) -> NebulaResult<()> {
    let Some(segments) = metadata.get("context_segments").and_then(|v| v.as_array()) else {
        return Ok(());
    };
    for segment in segments {
        let scopes = segment
            .get("scopes")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|s| s.as_str()).collect::<Vec<_>>())
            .unwrap_or_default();
        if scopes.is_empty() {
            return Err(invalid("context segment scopes required"));
        }
        for scope_name in scopes {
            if registry.scopes.id_of(scope_name).is_none() {
                return Err(invalid(format!("unknown scope: {scope_name}")));
            }
            if !entity_scopes.iter().any(|s| s == scope_name) {
                return Err(invalid("context segment scope not in entity scopes"));
            }
        }
    }
    Ok(())
}

pub async fn create_entity(
    store: &Store,
    registry: &EnumRegistry,
    mut input: CreateEntityInput,
    identity: AuditIdentity,
) -> NebulaResult<Entity> {
    input.name = sanitize_text(&input.name);
    input.type_name = sanitize_text(&input.type_name);
    input.tags = sanitize_tags(&input.tags)?;
    let vault_path = input
        .vault_file_path
        .as_deref()
        .map(sanitize_vault_path)
        .transpose()?
        .filter(|p| !p.is_empty());

    let status_id = registry.require_status(&input.status)?;
    let type_id = registry.require_entity_type(&input.type_name)?;
    let scope_ids = registry.require_scopes(&input.scopes)?;

    if let Some(path) = &vault_path {
        if let Some(existing) = store.find_entity_by_vault_path(path).await? {
            return Err(conflict(
                "entity",
                format!(
                    "entity already exists for vault file '{path}': {} (id: {})",
                    existing.name,
                    existing.id.as_uuid()
                ),
            ));
        }
    }

    if let Some(existing) = store
        .find_entity_by_identity(&input.name, type_id, &scope_ids)
        .await?
    {
        return Err(conflict(
            "entity",
            format!(
                "entity '{}' with same type and scopes already exists (id: {}); \
                 use different scopes or name if intentional",
                input.name,
                existing.id.as_uuid()
            ),
        ));
    }

    let metadata = validate_entity_metadata(&input.type_name, &sanitize_metadata(input.metadata.as_ref())?)?;
    validate_context_segments(registry, &metadata, &input.scopes)?;

    store
        .create_entity(
            &NewEntity {
                name: input.name,
                type_id,
                status_id,
                scope_ids,
                tags: input.tags,
                metadata,
                vault_path,
            },
            identity,
        )
        .await
}

pub async fn update_entity(
    store: &Store,
    registry: &EnumRegistry,
    mut input: UpdateEntityInput,
    identity: AuditIdentity,
) -> NebulaResult<Entity> {
    let status_id = input
        .status
        .as_deref()
        .map(|s| registry.require_status(s))
        .transpose()?;
    let tags = input.tags.take().map(|t| sanitize_tags(&t)).transpose()?;

    let metadata = match input.metadata.take() {
        Some(raw) => {
            let current = store
                .get_entity(input.entity_id)
                .await?
                .ok_or_else(|| ExecutorError::NotFound {
                    kind: "entity".to_string(),
                    id: input.entity_id.as_uuid().to_string(),
                })?;
            let type_name = registry
                .entity_types
                .name_of(current.type_id)
                .ok_or_else(|| invalid("entity's type is no longer in the taxonomy"))?;
            Some(validate_entity_metadata(
                type_name,
                &sanitize_metadata(Some(&raw))?,
            )?)
        }
        None => None,
    };

    store
        .update_entity(
            input.entity_id,
            status_id,
            tags.as_deref(),
            metadata.as_ref(),
            identity,
        )
        .await
}

pub async fn create_knowledge(
    store: &Store,
    registry: &EnumRegistry,
    mut input: CreateKnowledgeInput,
    identity: AuditIdentity,
) -> NebulaResult<KnowledgeItem> {
    input.title = sanitize_text(&input.title);
    input.source_type = sanitize_text(&input.source_type);
    input.tags = sanitize_tags(&input.tags)?;
    if let Some(url) = &input.url {
        let trimmed = url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(invalid("url must start with http:// or https://"));
        }
    }

    let scope_ids = registry.require_scopes(&input.scopes)?;
    let status_id = registry.require_status("active")?;

    if let Some(url) = &input.url {
        if let Some(existing) = store.find_knowledge_by_url(url).await? {
            return Err(conflict(
                "knowledge_item",
                format!(
                    "knowledge item already exists for url '{url}': id={}, title={}",
                    existing.id.as_uuid(),
                    existing.title
                ),
            ));
        }
    }

    let metadata = sanitize_metadata(input.metadata.as_ref())?;

    store
        .create_knowledge(
            &NewKnowledgeItem {
                title: input.title,
                url: input.url,
                source_type: input.source_type,
                content: input.content,
                scope_ids,
                tags: input.tags,
                metadata,
                status_id,
            },
            identity,
        )
        .await
}

pub async fn update_knowledge(
    store: &Store,
    registry: &EnumRegistry,
    mut input: UpdateKnowledgeInput,
    identity: AuditIdentity,
) -> NebulaResult<KnowledgeItem> {
    input.title = input.title.map(|t| sanitize_text(&t));
    let status_id = input
        .status
        .as_deref()
        .map(|s| registry.require_status(s))
        .transpose()?;
    let tags = input.tags.take().map(|t| sanitize_tags(&t)).transpose()?;
    let metadata = input
        .metadata
        .take()
        .map(|m| sanitize_metadata(Some(&m)))
        .transpose()?;

    store
        .update_knowledge(
            input.knowledge_id,
            input.title.as_deref(),
            input.content.as_deref(),
            status_id,
            tags.as_deref(),
            metadata.as_ref(),
            identity,
        )
        .await
}

pub async fn create_relationship(
    store: &Store,
    registry: &EnumRegistry,
    mut input: CreateRelationshipInput,
    identity: AuditIdentity,
) -> NebulaResult<Relationship> {
    input.relationship_type = sanitize_text(&input.relationship_type);
    let type_id = registry.require_relationship_type(&input.relationship_type)?;
    let status_id = registry.require_status("active")?;

    if !store.node_exists(&input.source).await? {
        return Err(ExecutorError::NotFound {
            kind: input.source.type_name().to_string(),
            id: input.source.id_key(),
        }
        .into());
    }
    if !store.node_exists(&input.target).await? {
        return Err(ExecutorError::NotFound {
            kind: input.target.type_name().to_string(),
            id: input.target.id_key(),
        }
        .into());
    }

    let properties = sanitize_metadata(input.properties.as_ref())?;

    store
        .create_relationship(
            &NewRelationship {
                source: input.source,
                target: input.target,
                type_id,
                status_id,
                properties,
            },
            identity,
        )
        .await
}

pub async fn update_relationship(
    store: &Store,
    registry: &EnumRegistry,
    mut input: UpdateRelationshipInput,
    identity: AuditIdentity,
) -> NebulaResult<Relationship> {
    let status_id = input
        .status
        .as_deref()
        .map(|s| registry.require_status(s))
        .transpose()?;
    let properties = input
        .properties
        .take()
        .map(|p| sanitize_metadata(Some(&p)))
        .transpose()?;

    store
        .update_relationship(
            input.relationship_id,
            status_id,
            properties.as_ref(),
            identity,
        )
        .await
}

pub async fn create_job(
    store: &Store,
    registry: &EnumRegistry,
    mut input: CreateJobInput,
    identity: AuditIdentity,
) -> NebulaResult<Job> {
    input.title = sanitize_text(&input.title);
    let status_id = registry.require_status("in-progress")?;
    let metadata = sanitize_metadata(input.metadata.as_ref())?;

    store
        .create_job(
            &NewJob {
                title: input.title,
                description: input.description,
                job_type: input.job_type,
                assignee_user_id: input.assigned_to,
                agent_id: input.agent_id,
                status_id,
                priority: input.priority.unwrap_or(nebula_core::JobPriority::Medium),
                parent_job_id: input.parent_job_id,
                due_at: input.due_at,
                metadata,
            },
            identity,
        )
        .await
}

pub async fn update_job(
    store: &Store,
    mut input: UpdateJobInput,
    identity: AuditIdentity,
) -> NebulaResult<Job> {
    input.title = input.title.map(|t| sanitize_text(&t));
    let metadata = input
        .metadata
        .take()
        .map(|m| sanitize_metadata(Some(&m)))
        .transpose()?;

    store
        .update_job(
            &input.job_id,
            input.title.as_deref(),
            input.description.as_deref(),
            input.priority,
            input.due_at,
            metadata.as_ref(),
            identity,
        )
        .await
}

pub async fn update_job_status(
    store: &Store,
    registry: &EnumRegistry,
    input: UpdateJobStatusInput,
    identity: AuditIdentity,
) -> NebulaResult<Job> {
    let status_id = registry.require_status(&input.status)?;
    store
        .update_job_status(&input.job_id, status_id, input.completed_at, identity)
        .await
}

pub async fn create_log(
    store: &Store,
    registry: &EnumRegistry,
    mut input: CreateLogInput,
    identity: AuditIdentity,
) -> NebulaResult<Log> {
    input.log_type = sanitize_text(&input.log_type);
    input.tags = sanitize_tags(&input.tags)?;
    let log_type_id = registry.require_log_type(&input.log_type)?;
    let status_id = registry.require_status("active")?;
    let metadata = sanitize_metadata(input.metadata.as_ref())?;
    let timestamp: Timestamp = input.timestamp.unwrap_or_else(chrono::Utc::now);

    store
        .create_log(
            &nebula_storage::NewLog {
                log_type_id,
                timestamp,
                value: input.value,
                status_id,
                tags: input.tags,
                metadata,
            },
            identity,
        )
        .await
}

pub async fn update_log(
    store: &Store,
    registry: &EnumRegistry,
    mut input: UpdateLogInput,
    identity: AuditIdentity,
) -> NebulaResult<Log> {
    let status_id = input
        .status
        .as_deref()
        .map(|s| registry.require_status(s))
        .transpose()?;
    let tags = input.tags.take().map(|t| sanitize_tags(&t)).transpose()?;

    store
        .update_log(
            input.log_id,
            input.value.as_ref(),
            status_id,
            tags.as_deref(),
            identity,
        )
        .await
}

pub async fn create_file(
    store: &Store,
    registry: &EnumRegistry,
    mut input: CreateFileInput,
    identity: AuditIdentity,
) -> NebulaResult<NebulaFile> {
    input.filename = sanitize_text(&input.filename);
    input.tags = sanitize_tags(&input.tags)?;
    let status_id = registry.require_status(&input.status)?;
    let metadata = sanitize_metadata(input.metadata.as_ref())?;

    store
        .create_file(
            &NewFile {
                filename: input.filename,
                file_path: input.file_path,
                mime_type: input.mime_type,
                size_bytes: input.size_bytes,
                checksum: input.checksum,
                status_id,
                tags: input.tags,
                metadata,
            },
            identity,
        )
        .await
}

pub async fn update_file(
    store: &Store,
    registry: &EnumRegistry,
    mut input: UpdateFileInput,
    identity: AuditIdentity,
) -> NebulaResult<NebulaFile> {
    let status_id = input
        .status
        .as_deref()
        .map(|s| registry.require_status(s))
        .transpose()?;
    let tags = input.tags.take().map(|t| sanitize_tags(&t)).transpose()?;
    let metadata = input
        .metadata
        .take()
        .map(|m| sanitize_metadata(Some(&m)))
        .transpose()?;

    store
        .update_file(
            input.file_id,
            status_id,
            tags.as_deref(),
            metadata.as_ref(),
            identity,
        )
        .await
}

pub async fn create_protocol(
    store: &Store,
    registry: &EnumRegistry,
    mut input: CreateProtocolInput,
    identity: AuditIdentity,
) -> NebulaResult<Protocol> {
    input.name = sanitize_text(&input.name);
    let scope_ids = registry.require_scopes(&input.scopes)?;
    let status_id = registry.require_status("active")?;
    let metadata = sanitize_metadata(input.metadata.as_ref())?;

    store
        .create_protocol(
            &NewProtocol {
                name: input.name,
                description: input.description,
                scope_ids,
                status_id,
                metadata,
            },
            identity,
        )
        .await
}

pub async fn update_protocol(
    store: &Store,
    registry: &EnumRegistry,
    mut input: UpdateProtocolInput,
    identity: AuditIdentity,
) -> NebulaResult<Protocol> {
    let status_id = input
        .status
        .as_deref()
        .map(|s| registry.require_status(s))
        .transpose()?;
    let metadata = input
        .metadata
        .take()
        .map(|m| sanitize_metadata(Some(&m)))
        .transpose()?;

    store
        .update_protocol(
            input.protocol_id,
            input.description.as_deref(),
            status_id,
            metadata.as_ref(),
            identity,
        )
        .await
}

/// `normalize_bulk_operation` has no Rust counterpart: `BulkOp` is already a
/// closed three-variant enum deserialized straight off the wire, so there's
/// no free-form string to normalize.
pub async fn bulk_update_entity_tags(
    store: &Store,
    mut input: nebula_core::BulkUpdateEntityTagsInput,
    identity: AuditIdentity,
) -> NebulaResult<serde_json::Value> {
    input.tags = sanitize_tags(&input.tags)?;
    let results = store
        .bulk_update_entity_tags(&input.entity_ids, input.op, &input.tags, identity)
        .await;
    Ok(summarize_bulk(results))
}

pub async fn bulk_update_entity_scopes(
    store: &Store,
    registry: &EnumRegistry,
    input: nebula_core::BulkUpdateEntityScopesInput,
    identity: AuditIdentity,
) -> NebulaResult<serde_json::Value> {
    let scope_ids = registry.require_scopes(&input.scopes)?;
    let results = store
        .bulk_update_entity_scopes(&input.entity_ids, input.op, &scope_ids, identity)
        .await;
    Ok(summarize_bulk(results))
}

fn summarize_bulk(
    results: Vec<(nebula_core::EntityId, NebulaResult<()>)>,
) -> serde_json::Value {
    let updated: Vec<String> = results
        .iter()
        .filter(|(_, r)| r.is_ok())
        .map(|(id, _)| id.as_uuid().to_string())
        .collect();
    serde_json::json!({
        "updated": updated.len(),
        "entity_ids": updated,
    })
}

pub async fn revert_entity(
    store: &Store,
    input: RevertEntityInput,
    identity: AuditIdentity,
) -> NebulaResult<Entity> {
    store
        .revert_entity(input.entity_id, input.audit_row_id, identity)
        .await
}
