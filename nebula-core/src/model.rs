//! Nebula data model — pure structs, no store access.
//!
//! Field sets follow spec §3 directly; per-entity-type input shapes follow
//! the closed-shape design note in spec §9 (a typed struct per action
//! instead of an untyped JSON blob).

use crate::{
    ApiKeyId, ApprovalRequestId, AuditIdentity, EnrollmentSessionId, EntityId, EntityTypeId,
    FileId, KnowledgeItemId, LogId, LogTypeId, NebulaAgentId, ProtocolId, RelationshipId,
    RelationshipTypeId, ScopeRecordId, StatusId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// CALLER
// ============================================================================

/// The resolved identity behind one request. Ephemeral — never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    User {
        user_id: UserId,
        owner_scope_names: HashSet<String>,
        effective_scope_names: HashSet<String>,
    },
    Agent {
        agent_id: NebulaAgentId,
        trusted: bool,
        owner_scope_names: HashSet<String>,
        effective_scope_names: HashSet<String>,
        capabilities: HashSet<String>,
    },
    Bootstrap,
}

impl Caller {
    pub fn effective_scope_names(&self) -> &HashSet<String> {
        use std::sync::OnceLock;
        static EMPTY: OnceLock<HashSet<String>> = OnceLock::new();
        match self {
            Caller::User {
                effective_scope_names,
                ..
            } => effective_scope_names,
            Caller::Agent {
                effective_scope_names,
                ..
            } => effective_scope_names,
            Caller::Bootstrap => EMPTY.get_or_init(HashSet::new),
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Caller::Agent { .. })
    }

    pub fn is_bootstrap(&self) -> bool {
        matches!(self, Caller::Bootstrap)
    }

    /// Whether this caller may mutate directly without going through the
    /// approval gate.
    pub fn is_trusted(&self) -> bool {
        match self {
            Caller::User { .. } => true,
            Caller::Agent { trusted, .. } => *trusted,
            Caller::Bootstrap => false,
        }
    }

    pub fn agent_id(&self) -> Option<NebulaAgentId> {
        match self {
            Caller::Agent { agent_id, .. } => Some(*agent_id),
            _ => None,
        }
    }
}

// ============================================================================
// AGENT
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: NebulaAgentId,
    pub name: String,
    pub description: Option<String>,
    pub owner_scope_ids: Vec<ScopeRecordId>,
    pub capabilities: Vec<String>,
    pub requires_approval: bool,
    pub status_id: StatusId,
}

// ============================================================================
// CONTEXT SEGMENTS
// ============================================================================

/// A per-scope slice of an entity's metadata, filtered out of responses
/// when the caller's effective scopes don't intersect `scopes`.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSegment {
    pub text: String,
    pub scopes: Vec<String>,
}

// ============================================================================
// ENTITY
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub type_id: EntityTypeId,
    pub status_id: StatusId,
    pub scope_ids: Vec<ScopeRecordId>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub vault_path: Option<String>,
}

pub const MAX_TAGS: usize = 50;
pub const MAX_TAG_LEN: usize = 64;

// ============================================================================
// KNOWLEDGE ITEM
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: KnowledgeItemId,
    pub title: String,
    pub url: Option<String>,
    pub source_type: String,
    pub content: Option<String>,
    pub scope_ids: Vec<ScopeRecordId>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub status_id: StatusId,
}

// ============================================================================
// RELATIONSHIP
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub source: crate::NodeRef,
    pub target: crate::NodeRef,
    pub type_id: RelationshipTypeId,
    pub status_id: StatusId,
    pub properties: serde_json::Value,
}

// ============================================================================
// JOB
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Human-readable id of the form `YYYYQ#-NNNN`.
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub job_type: Option<String>,
    pub assignee_user_id: Option<UserId>,
    pub agent_id: Option<NebulaAgentId>,
    pub status_id: StatusId,
    pub priority: JobPriority,
    pub parent_job_id: Option<String>,
    pub due_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub metadata: serde_json::Value,
}

/// Parse a job quarter-year prefix (`YYYYQ#`) from a full job id.
pub fn job_quarter_prefix(job_id: &str) -> Option<&str> {
    job_id.split_once('-').map(|(prefix, _)| prefix)
}

// ============================================================================
// LOG
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub id: LogId,
    pub log_type_id: LogTypeId,
    pub timestamp: Timestamp,
    pub value: serde_json::Value,
    pub status_id: StatusId,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
}

// ============================================================================
// FILE
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NebulaFile {
    pub id: FileId,
    pub filename: String,
    pub file_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub checksum: Option<String>,
    pub status_id: StatusId,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
}

// ============================================================================
// PROTOCOL
// ============================================================================

/// A named, versionable procedure document attachable to entities via
/// relationships. Created/updated through `create_protocol`/`update_protocol`.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub id: ProtocolId,
    pub name: String,
    pub description: Option<String>,
    pub scope_ids: Vec<ScopeRecordId>,
    pub status_id: StatusId,
    pub metadata: serde_json::Value,
}

// ============================================================================
// APPROVAL REQUEST
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    ApprovedFailed,
    Rejected,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: ApprovalRequestId,
    pub request_type: String,
    pub requested_by_agent_id: NebulaAgentId,
    pub change_details: serde_json::Value,
    pub status: ApprovalStatus,
    pub reviewed_by_user_id: Option<UserId>,
    pub reviewed_at: Option<Timestamp>,
    pub review_notes: Option<String>,
    pub review_details: Option<serde_json::Value>,
    pub linked_record_id: Option<String>,
    pub related_job_id: Option<String>,
}

// ============================================================================
// ENROLLMENT SESSION
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    PendingApproval,
    Approved,
    Rejected,
    Expired,
    Redeemed,
}

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentSession {
    pub id: EnrollmentSessionId,
    pub agent_id: NebulaAgentId,
    pub enrollment_token_hash: String,
    pub status: EnrollmentStatus,
    pub approval_request_id: ApprovalRequestId,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

// ============================================================================
// SCOPE TAXONOMY ROW
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub id: ScopeRecordId,
    pub name: String,
    pub is_builtin: bool,
}

// ============================================================================
// API KEY
// ============================================================================

#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub key_hash: String,
    pub prefix: String,
    pub entity_id: Option<UserId>,
    pub agent_id: Option<NebulaAgentId>,
    /// Overlay scopes narrowing the owner's scopes; empty means "inherit".
    pub scopes: Vec<String>,
    pub label: String,
    pub last_used_at: Option<Timestamp>,
    pub revoked_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl ApiKey {
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.revoked_at.is_none() && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

// ============================================================================
// AUDIT LOG
// ============================================================================

/// One row of the append-only audit log every mutating store method writes
/// to alongside its primary change. `revert_entity` replays `new_data` (or
/// `old_data` for a delete) from a specific row back onto the live record;
/// the history/diff endpoints read ranges of these directly.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: uuid::Uuid,
    pub table_name: String,
    pub record_id: String,
    pub action: String,
    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_by: AuditIdentity,
    pub created_at: Timestamp,
}

// ============================================================================
// ACTION INPUT SHAPES (closed per-action structs, spec §9)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEntityInput {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub status: String,
    pub scopes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub vault_file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEntityInput {
    pub entity_id: EntityId,
    pub status: Option<String>,
    pub status_reason: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateKnowledgeInput {
    pub title: String,
    pub url: Option<String>,
    pub source_type: String,
    pub content: Option<String>,
    pub scopes: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateKnowledgeInput {
    pub knowledge_id: KnowledgeItemId,
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRelationshipInput {
    pub source: crate::NodeRef,
    pub target: crate::NodeRef,
    pub relationship_type: String,
    #[serde(default)]
    pub properties: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRelationshipInput {
    pub relationship_id: RelationshipId,
    pub status: Option<String>,
    #[serde(default)]
    pub properties: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobInput {
    pub title: String,
    pub description: Option<String>,
    pub job_type: Option<String>,
    pub assigned_to: Option<UserId>,
    pub agent_id: Option<NebulaAgentId>,
    #[serde(default)]
    pub priority: Option<JobPriority>,
    pub parent_job_id: Option<String>,
    pub due_at: Option<Timestamp>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateJobInput {
    pub job_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<JobPriority>,
    pub due_at: Option<Timestamp>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateJobStatusInput {
    pub job_id: String,
    pub status: String,
    pub status_reason: Option<String>,
    pub completed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLogInput {
    pub log_type: String,
    pub timestamp: Option<Timestamp>,
    pub value: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLogInput {
    pub log_id: LogId,
    pub value: Option<serde_json::Value>,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFileInput {
    pub filename: String,
    pub file_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub checksum: Option<String>,
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFileInput {
    pub file_id: FileId,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProtocolInput {
    pub name: String,
    pub description: Option<String>,
    pub scopes: Vec<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProtocolInput {
    pub protocol_id: ProtocolId,
    pub description: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOp {
    Add,
    Remove,
    Replace,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkUpdateEntityTagsInput {
    pub entity_ids: Vec<EntityId>,
    pub op: BulkOp,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkUpdateEntityScopesInput {
    pub entity_ids: Vec<EntityId>,
    pub op: BulkOp,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevertEntityInput {
    pub entity_id: EntityId,
    pub audit_row_id: uuid::Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAgentInput {
    pub agent_id: NebulaAgentId,
}

/// Reviewer grants applied in place of the agent's originally requested
/// values when approving a `register_agent` proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAgentGrants {
    pub grant_scopes: Option<Vec<String>>,
    pub grant_requires_approval: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_bootstrap_has_empty_scopes() {
        let caller = Caller::Bootstrap;
        assert!(caller.effective_scope_names().is_empty());
        assert!(!caller.is_trusted());
    }

    #[test]
    fn caller_user_is_always_trusted() {
        let caller = Caller::User {
            user_id: UserId::now_v7(),
            owner_scope_names: HashSet::new(),
            effective_scope_names: HashSet::new(),
        };
        assert!(caller.is_trusted());
    }

    #[test]
    fn caller_agent_trust_follows_flag() {
        let trusted_agent = Caller::Agent {
            agent_id: NebulaAgentId::now_v7(),
            trusted: true,
            owner_scope_names: HashSet::new(),
            effective_scope_names: HashSet::new(),
            capabilities: HashSet::new(),
        };
        assert!(trusted_agent.is_trusted());

        let untrusted_agent = Caller::Agent {
            agent_id: NebulaAgentId::now_v7(),
            trusted: false,
            owner_scope_names: HashSet::new(),
            effective_scope_names: HashSet::new(),
            capabilities: HashSet::new(),
        };
        assert!(!untrusted_agent.is_trusted());
    }

    #[test]
    fn job_quarter_prefix_splits_on_dash() {
        assert_eq!(job_quarter_prefix("2026Q3-00A1"), Some("2026Q3"));
        assert_eq!(job_quarter_prefix("malformed"), None);
    }

    #[test]
    fn api_key_active_when_not_revoked_or_expired() {
        use crate::EntityIdType;
        let now = chrono::Utc::now();
        let key = ApiKey {
            id: ApiKeyId::now_v7(),
            key_hash: String::new(),
            prefix: "nbl_abcd".into(),
            entity_id: None,
            agent_id: None,
            scopes: vec![],
            label: "test".into(),
            last_used_at: None,
            revoked_at: None,
            expires_at: None,
            created_at: now,
        };
        assert!(key.is_active(now));

        let revoked = ApiKey {
            revoked_at: Some(now),
            ..key
        };
        assert!(!revoked.is_active(now));
    }
}
