//! Audit identity and polymorphic node references.
//!
//! Source pattern: per-request audit identity was set via session-scoped
//! store configuration. We model it as an explicit typed value threaded
//! through the request context instead; the store layer binds it to the
//! transaction at acquisition time.

use crate::{
    EntityId, EntityIdType, FileId, KnowledgeItemId, LogId, NebulaAgentId, ProtocolId, UserId,
};
use serde::{Deserialize, Serialize};

/// The (kind, id) pair bound to a mutating transaction so the store can
/// attribute the change to a caller.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AuditIdentity {
    /// A human user, identified by their entity record.
    User(UserId),
    /// An agent acting directly (trusted) or as the subject of a reviewer
    /// action (register_agent executed under the reviewer's identity, not
    /// the agent's own).
    Agent(NebulaAgentId),
}

/// A polymorphic reference to one of the node kinds a relationship may
/// connect, or that a file/log may be attached to.
///
/// The store layer keeps the underlying `(source_type, source_id)` string
/// columns for compatibility; this tagged variant is the public-facing
/// representation the scope mediator dispatches on.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum NodeRef {
    Entity(EntityId),
    Knowledge(KnowledgeItemId),
    Log(LogId),
    /// Jobs have no uuid newtype — the primary key is the store-generated
    /// `YYYYQ#-NNNN` string, so this carries that string directly.
    Job(String),
    Agent(NebulaAgentId),
    File(FileId),
    Protocol(ProtocolId),
}

impl NodeRef {
    /// The string discriminant stored in the `source_type`/`target_type`
    /// columns.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeRef::Entity(_) => "entity",
            NodeRef::Knowledge(_) => "knowledge",
            NodeRef::Log(_) => "log",
            NodeRef::Job(_) => "job",
            NodeRef::Agent(_) => "agent",
            NodeRef::File(_) => "file",
            NodeRef::Protocol(_) => "protocol",
        }
    }

    /// The id as stored in the polymorphic `source_id`/`target_id` text
    /// column — every other kind's `Uuid` formatted to a string, or the
    /// job id verbatim.
    pub fn id_key(&self) -> String {
        match self {
            NodeRef::Entity(id) => id.as_uuid().to_string(),
            NodeRef::Knowledge(id) => id.as_uuid().to_string(),
            NodeRef::Log(id) => id.as_uuid().to_string(),
            NodeRef::Job(id) => id.clone(),
            NodeRef::Agent(id) => id.as_uuid().to_string(),
            NodeRef::File(id) => id.as_uuid().to_string(),
            NodeRef::Protocol(id) => id.as_uuid().to_string(),
        }
    }
}
