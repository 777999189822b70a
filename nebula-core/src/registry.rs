//! Enum Registry (C1) — pure, in-memory bidirectional name↔id maps.
//!
//! Loading the five sections from the store lives in `nebula-storage`; this
//! module only defines the immutable snapshot type and its resolve methods,
//! matching the "pure data structures, no behavior beyond the data itself"
//! rule this crate follows for everything else.

use crate::{EntityTypeId, LogTypeId, RelationshipTypeId, ScopeRecordId, StatusId, TaxonomyError};
#[cfg(test)]
use crate::EntityIdType;
use std::collections::HashMap;

/// A bidirectional mapping between taxonomy names and ids, for one section
/// (statuses, scopes, entity types, relationship types, or log types).
#[derive(Debug, Clone, Default)]
pub struct EnumSection<Id> {
    name_to_id: HashMap<String, Id>,
    id_to_name: HashMap<Id, String>,
}

impl<Id> EnumSection<Id>
where
    Id: Copy + Eq + std::hash::Hash,
{
    pub fn new(rows: impl IntoIterator<Item = (String, Id)>) -> Self {
        let mut name_to_id = HashMap::new();
        let mut id_to_name = HashMap::new();
        for (name, id) in rows {
            id_to_name.insert(id, name.clone());
            name_to_id.insert(name, id);
        }
        Self {
            name_to_id,
            id_to_name,
        }
    }

    pub fn id_of(&self, name: &str) -> Option<Id> {
        self.name_to_id.get(name).copied()
    }

    pub fn name_of(&self, id: Id) -> Option<&str> {
        self.id_to_name.get(&id).map(String::as_str)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.name_to_id.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.name_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }
}

/// Process-wide immutable snapshot of all five taxonomy sections.
///
/// Reload is a full replacement of the snapshot behind an atomic reference
/// (see `nebula-storage::registry::RegistryHandle`); readers never observe
/// a torn read because they always dereference one `Arc<EnumRegistry>`.
#[derive(Debug, Clone, Default)]
pub struct EnumRegistry {
    pub statuses: EnumSection<StatusId>,
    pub scopes: EnumSection<ScopeRecordId>,
    pub relationship_types: EnumSection<RelationshipTypeId>,
    pub entity_types: EnumSection<EntityTypeId>,
    pub log_types: EnumSection<LogTypeId>,
}

impl EnumRegistry {
    pub fn require_status(&self, name: &str) -> Result<StatusId, TaxonomyError> {
        require(name, &self.statuses, "status")
    }

    pub fn require_entity_type(&self, name: &str) -> Result<EntityTypeId, TaxonomyError> {
        require(name, &self.entity_types, "entity type")
    }

    pub fn require_relationship_type(
        &self,
        name: &str,
    ) -> Result<RelationshipTypeId, TaxonomyError> {
        require(name, &self.relationship_types, "relationship type")
    }

    pub fn require_log_type(&self, name: &str) -> Result<LogTypeId, TaxonomyError> {
        require(name, &self.log_types, "log type")
    }

    /// Resolve a non-empty list of scope names. Empty input is rejected
    /// (scopes are required on every entity/knowledge write).
    pub fn require_scopes(&self, names: &[String]) -> Result<Vec<ScopeRecordId>, TaxonomyError> {
        if names.is_empty() {
            return Err(TaxonomyError::Required { label: "scopes" });
        }
        names
            .iter()
            .map(|n| require(n, &self.scopes, "scope"))
            .collect()
    }

    /// Map a scope id back to its name; used by the mediator to translate
    /// a caller's scope ids into names for segment filtering.
    pub fn scope_name_of(&self, id: ScopeRecordId) -> Option<&str> {
        self.scopes.name_of(id)
    }
}

fn require<Id: Copy + Eq + std::hash::Hash>(
    name: &str,
    section: &EnumSection<Id>,
    label: &'static str,
) -> Result<Id, TaxonomyError> {
    if name.is_empty() {
        return Err(TaxonomyError::Required { label });
    }
    section.id_of(name).ok_or_else(|| TaxonomyError::Unknown {
        label,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EnumSection<StatusId> {
        EnumSection::new(vec![
            ("active".to_string(), StatusId::now_v7()),
            ("archived".to_string(), StatusId::now_v7()),
        ])
    }

    #[test]
    fn resolves_known_name() {
        let section = sample();
        assert!(section.id_of("active").is_some());
    }

    #[test]
    fn rejects_unknown_name() {
        let registry = EnumRegistry {
            statuses: sample(),
            ..Default::default()
        };
        let err = registry.require_status("nonexistent").unwrap_err();
        assert!(matches!(err, TaxonomyError::Unknown { .. }));
    }

    #[test]
    fn rejects_empty_scope_list() {
        let registry = EnumRegistry::default();
        let err = registry.require_scopes(&[]).unwrap_err();
        assert!(matches!(err, TaxonomyError::Required { .. }));
    }

    #[test]
    fn name_of_roundtrips() {
        let id = StatusId::now_v7();
        let section = EnumSection::new(vec![("active".to_string(), id)]);
        assert_eq!(section.name_of(id), Some("active"));
        assert_eq!(section.id_of("active"), Some(id));
    }
}
