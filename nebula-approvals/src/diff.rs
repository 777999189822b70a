//! `diff(requestId) → {changes: map(field → {from, to})}`, used by the admin
//! `GET /approvals/{id}/diff` route so a reviewer can see exactly what an
//! approval would change without reading raw JSON.
//!
//! For an `update_*` proposal, loads the current record by the id embedded
//! in the payload and computes field-level deltas; for `create_*` (and
//! `register_agent`, which has no prior record) every proposed key reports
//! `{from: null, to: value}`. Complex values are compared via their
//! canonical `serde_json::Value` form, which is already order-independent
//! for objects.

use nebula_core::{ApprovalRequest, EntityIdType, FileId, KnowledgeItemId, LogId, ProtocolId, RelationshipId};
use nebula_storage::Store;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FieldChange {
    pub from: Value,
    pub to: Value,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ApprovalDiff {
    pub action: String,
    pub changes: BTreeMap<String, FieldChange>,
}

const ID_FIELDS: &[&str] = &[
    "entity_id",
    "knowledge_id",
    "relationship_id",
    "job_id",
    "log_id",
    "file_id",
    "protocol_id",
    "agent_id",
    "audit_row_id",
];

fn compute_changes(before: Option<&Value>, after: &Value) -> BTreeMap<String, FieldChange> {
    let mut changes = BTreeMap::new();
    let Some(after_obj) = after.as_object() else {
        return changes;
    };
    let before_obj = before.and_then(|v| v.as_object());
    for (key, to) in after_obj {
        if ID_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let from = before_obj
            .and_then(|o| o.get(key))
            .cloned()
            .unwrap_or(Value::Null);
        if &from != to {
            changes.insert(
                key.clone(),
                FieldChange {
                    from,
                    to: to.clone(),
                },
            );
        }
    }
    changes
}

fn parse_uuid_field(details: &Value, field: &str) -> Option<uuid::Uuid> {
    details.get(field)?.as_str()?.parse().ok()
}

pub async fn compute(store: &Store, request: &ApprovalRequest) -> nebula_core::NebulaResult<ApprovalDiff> {
    let after = request.change_details.clone();

    let before = match request.request_type.as_str() {
        "update_entity" | "revert_entity" => {
            fetch_opt(store.get_entity(nebula_core::EntityId::new(
                parse_uuid_field(&after, "entity_id").unwrap_or_default(),
            )))
            .await?
        }
        "update_knowledge" => {
            fetch_opt(store.get_knowledge(KnowledgeItemId::new(
                parse_uuid_field(&after, "knowledge_id").unwrap_or_default(),
            )))
            .await?
        }
        "update_relationship" => {
            fetch_opt(store.get_relationship(RelationshipId::new(
                parse_uuid_field(&after, "relationship_id").unwrap_or_default(),
            )))
            .await?
        }
        "update_job" | "update_job_status" => match after.get("job_id").and_then(|v| v.as_str()) {
            Some(job_id) => store
                .get_job(job_id)
                .await?
                .map(|j| serde_json::to_value(j).unwrap_or(Value::Null)),
            None => None,
        },
        "update_log" => {
            fetch_opt(store.get_log(LogId::new(
                parse_uuid_field(&after, "log_id").unwrap_or_default(),
            )))
            .await?
        }
        "update_file" => {
            fetch_opt(store.get_file(FileId::new(
                parse_uuid_field(&after, "file_id").unwrap_or_default(),
            )))
            .await?
        }
        "update_protocol" => {
            fetch_opt(store.get_protocol(ProtocolId::new(
                parse_uuid_field(&after, "protocol_id").unwrap_or_default(),
            )))
            .await?
        }
        _ => None,
    };

    Ok(ApprovalDiff {
        action: request.request_type.clone(),
        changes: compute_changes(before.as_ref(), &after),
    })
}

/// Serializes whatever `get_*` found, or `None` if the record doesn't
/// exist (including the case where the payload's id field was missing or
/// unparseable and the lookup used the all-zero fallback uuid).
async fn fetch_opt<F, T>(fut: F) -> nebula_core::NebulaResult<Option<Value>>
where
    F: std::future::Future<Output = nebula_core::NebulaResult<Option<T>>>,
    T: serde::Serialize,
{
    Ok(fut
        .await?
        .map(|record| serde_json::to_value(record).unwrap_or(Value::Null)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compute_changes_reports_only_differing_keys() {
        let before = json!({"title": "old", "status": "active", "entity_id": "x"});
        let after = json!({"title": "new", "status": "active", "entity_id": "x"});
        let changes = compute_changes(Some(&before), &after);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["title"].from, json!("old"));
        assert_eq!(changes["title"].to, json!("new"));
    }

    #[test]
    fn compute_changes_with_no_before_reports_every_key_as_newly_set() {
        let after = json!({"title": "new", "status": "active"});
        let changes = compute_changes(None, &after);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["title"].from, Value::Null);
    }
}
