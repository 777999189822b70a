//! Identity types for Nebula records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ENTITY ID TYPE SYSTEM
// ============================================================================

/// Trait for type-safe record IDs.
///
/// Each record kind gets its own newtype so ids cannot be mixed up at
/// compile time (an `EntityId` can never be passed where a `FileId` is
/// expected, even though both wrap a `Uuid`). Jobs are the one record kind
/// with no newtype here — their primary key is the human-readable
/// `YYYYQ#-NNNN` string the store generates, not a `Uuid`.
pub trait EntityIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The name of the record kind (e.g., "entity", "job").
    const ENTITY_NAME: &'static str;

    /// Create a new ID from a UUID.
    fn new(uuid: Uuid) -> Self;

    /// Get the underlying UUID.
    fn as_uuid(&self) -> Uuid;

    /// Create a nil (all zeros) ID.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    /// Create a new timestamp-sortable UUIDv7 ID.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// Create a new random UUIDv4 ID.
    fn new_v4() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Error type for parsing entity IDs from strings.
#[derive(Debug, Clone)]
pub struct EntityIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for EntityIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to parse {} ID from '{}': {}",
            self.entity_name, self.input, self.source
        )
    }
}

impl std::error::Error for EntityIdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Macro to define a type-safe record ID newtype.
macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self::new)
                    .map_err(|e| EntityIdParseError {
                        entity_name: Self::ENTITY_NAME,
                        input: s.to_string(),
                        source: e,
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

// ============================================================================
// RECORD ID TYPES
// ============================================================================

define_entity_id!(EntityId, "entity", "Type-safe ID for entity records.");
define_entity_id!(
    KnowledgeItemId,
    "knowledge_item",
    "Type-safe ID for knowledge item records."
);
define_entity_id!(
    RelationshipId,
    "relationship",
    "Type-safe ID for relationship records."
);
define_entity_id!(LogId, "log", "Type-safe ID for log records.");
define_entity_id!(FileId, "file", "Type-safe ID for file records.");
define_entity_id!(
    ApprovalRequestId,
    "approval_request",
    "Type-safe ID for approval request records."
);
define_entity_id!(
    EnrollmentSessionId,
    "enrollment_session",
    "Type-safe ID for enrollment session records."
);
define_entity_id!(NebulaAgentId, "agent", "Type-safe ID for agent records.");
define_entity_id!(ApiKeyId, "api_key", "Type-safe ID for API key records.");
define_entity_id!(ScopeRecordId, "scope", "Type-safe ID for scope taxonomy rows.");
define_entity_id!(StatusId, "status", "Type-safe ID for status taxonomy rows.");
define_entity_id!(
    EntityTypeId,
    "entity_type",
    "Type-safe ID for entity-type taxonomy rows."
);
define_entity_id!(
    RelationshipTypeId,
    "relationship_type",
    "Type-safe ID for relationship-type taxonomy rows."
);
define_entity_id!(LogTypeId, "log_type", "Type-safe ID for log-type taxonomy rows.");
define_entity_id!(
    ProtocolId,
    "protocol",
    "Type-safe ID for protocol records."
);
define_entity_id!(
    UserId,
    "user",
    "Type-safe ID for the human-owner side of a caller."
);

// ============================================================================
// OTHER IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash, used for enrollment token and API key prefixes.
pub type ContentHash = [u8; 32];

// ============================================================================
// UTILITY FUNCTIONS
// ============================================================================

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_type_safety() {
        let entity_id = EntityId::now_v7();
        let file_id = FileId::now_v7();
        assert_ne!(entity_id.as_uuid(), file_id.as_uuid());
    }

    #[test]
    fn entity_id_display() {
        let id = EntityId::new(Uuid::nil());
        assert_eq!(
            format!("{:?}", id),
            "EntityId(00000000-0000-0000-0000-000000000000)"
        );
        assert_eq!(format!("{}", id), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn entity_id_from_str() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: EntityId = uuid_str.parse().expect("valid UUID should parse");
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn entity_id_parse_error() {
        let result: Result<EntityId, _> = "invalid".parse();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.entity_name, "entity");
        assert_eq!(err.input, "invalid");
    }

    #[test]
    fn entity_id_serde_roundtrip() {
        let id = FileId::now_v7();
        let json = serde_json::to_string(&id).expect("serialization should succeed");
        assert!(json.starts_with('"'));
        let deserialized: FileId =
            serde_json::from_str(&json).expect("deserialization should succeed");
        assert_eq!(id, deserialized);
    }

    #[test]
    fn entity_id_default_is_nil() {
        let id = EntityId::default();
        assert_eq!(id, EntityId::nil());
    }
}
