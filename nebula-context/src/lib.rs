//! Nebula Scope Mediator (C4) — pure predicates plus store-assisted checks
//! deciding read/write access, and the read-side metadata filter.
//!
//! Grounded on `nebula_api/routes/approvals.py`'s `_require_admin_scope`
//! and the visibility rules implied by spec.md §4.2. The pure predicates
//! (`is_admin`, `has_write_scopes`, `subset`, `filter_segments`) take no
//! store access and are unit-tested directly; the store-assisted checks
//! hang off [`ScopeMediator`], which owns a [`Store`] and a
//! `RegistryHandle` to translate a record's scope *ids* into the names a
//! `Caller` carries.

use nebula_core::{Caller, EntityId, FileId, KnowledgeItemId, NebulaResult, NodeRef};
use nebula_storage::{RegistryHandle, Store};
use std::collections::HashSet;
use std::sync::Arc;

mod auth;
mod mediator;

pub use auth::{generate_api_key, inactive_status_id, Authenticator, AuthenticatorConfig, GeneratedApiKey};

/// The exact set of scope *names* that count as admin, and whether the
/// non-strict no-op mode is in effect. Grounded on the source's module-level
/// `ADMIN_SCOPE_NAMES = {"vault-only", "sensitive"}` constant and its
/// `NEBULA_STRICT_ADMIN` env gate.
#[derive(Debug, Clone)]
pub struct ScopeMediatorConfig {
    pub admin_scope_names: HashSet<String>,
    /// Mirrors `NEBULA_STRICT_ADMIN=1`. When `false`, `is_admin` is a no-op
    /// that always passes — matching the source, where the unset case
    /// returns immediately without checking anything.
    pub strict_admin: bool,
}

impl Default for ScopeMediatorConfig {
    fn default() -> Self {
        Self {
            admin_scope_names: ["vault-only", "sensitive"]
                .into_iter()
                .map(String::from)
                .collect(),
            strict_admin: false,
        }
    }
}

/// Owns the store handle and registry snapshot needed for the
/// store-assisted checks; the pure predicates below don't need one of
/// these and are plain functions instead.
#[derive(Clone)]
pub struct ScopeMediator {
    store: Store,
    registry: Arc<RegistryHandle>,
    config: ScopeMediatorConfig,
}

impl ScopeMediator {
    pub fn new(store: Store, registry: Arc<RegistryHandle>, config: ScopeMediatorConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &ScopeMediatorConfig {
        &self.config
    }

    /// `isAdmin`, gated by strict mode. Only agent callers are ever
    /// checked; user and bootstrap callers always pass, matching the
    /// source (`_require_admin_scope` only inspects `caller_type ==
    /// "agent"`).
    pub fn is_admin(&self, caller: &Caller) -> bool {
        if !self.config.strict_admin {
            return true;
        }
        match caller {
            Caller::Agent {
                effective_scope_names,
                ..
            } => !effective_scope_names.is_disjoint(&self.config.admin_scope_names),
            _ => true,
        }
    }

    pub async fn entity_write_access(
        &self,
        caller: &Caller,
        entity_ids: &[EntityId],
    ) -> NebulaResult<()> {
        mediator::entity_write_access(&self.store, &self.registry, caller, entity_ids).await
    }

    pub async fn knowledge_write_access(
        &self,
        caller: &Caller,
        knowledge_ids: &[KnowledgeItemId],
    ) -> NebulaResult<()> {
        mediator::knowledge_write_access(&self.store, &self.registry, caller, knowledge_ids).await
    }

    pub async fn job_ownership(&self, caller: &Caller, job_id: &str) -> NebulaResult<()> {
        mediator::job_ownership(&self.store, caller, job_id).await
    }

    pub async fn file_visibility(&self, caller: &Caller, file_id: FileId) -> NebulaResult<bool> {
        mediator::file_visibility(&self.store, &self.registry, caller, file_id).await
    }

    pub async fn relationship_endpoint_check(
        &self,
        caller: &Caller,
        node: &NodeRef,
    ) -> NebulaResult<()> {
        mediator::relationship_endpoint_check(&self.store, &self.registry, caller, node).await
    }
}

/// `hasWriteScopes(callerScopes, recordScopes)`.
pub fn has_write_scopes(caller_scopes: &HashSet<String>, record_scopes: &HashSet<String>) -> bool {
    record_scopes.is_empty() || record_scopes.is_subset(caller_scopes)
}

/// `subset(requestedScopes, allowed)` — narrows an agent-submitted scope
/// list down to what it actually holds.
pub fn subset(requested: &HashSet<String>, allowed: &HashSet<String>) -> HashSet<String> {
    requested.intersection(allowed).cloned().collect()
}

/// `filterSegments(metadata, callerScopeNames)` — drops every
/// `context_segments` entry whose `scopes` don't intersect the caller's,
/// leaving every other metadata key untouched.
pub fn filter_segments(
    metadata: &serde_json::Value,
    caller_scope_names: &HashSet<String>,
) -> serde_json::Value {
    let mut metadata = metadata.clone();
    let Some(obj) = metadata.as_object_mut() else {
        return metadata;
    };
    let Some(segments) = obj.get("context_segments").and_then(|s| s.as_array()) else {
        return metadata;
    };
    let filtered: Vec<serde_json::Value> = segments
        .iter()
        .filter(|segment| {
            let scopes = segment
                .get("scopes")
                .and_then(|s| s.as_array())
                .map(|s| s.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>())
                .unwrap_or_default();
            scopes.is_empty() || scopes.iter().any(|s| caller_scope_names.contains(*s))
        })
        .cloned()
        .collect();
    obj.insert(
        "context_segments".to_string(),
        serde_json::Value::Array(filtered),
    );
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scopes(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn has_write_scopes_public_record_always_passes() {
        assert!(has_write_scopes(&scopes(&[]), &scopes(&[])));
        assert!(has_write_scopes(&scopes(&["anything"]), &scopes(&[])));
    }

    #[test]
    fn has_write_scopes_requires_subset() {
        assert!(has_write_scopes(&scopes(&["a", "b"]), &scopes(&["a"])));
        assert!(!has_write_scopes(&scopes(&["a"]), &scopes(&["a", "b"])));
    }

    #[test]
    fn subset_intersects() {
        let requested = scopes(&["a", "b", "c"]);
        let allowed = scopes(&["b", "c", "d"]);
        assert_eq!(subset(&requested, &allowed), scopes(&["b", "c"]));
    }

    #[test]
    fn filter_segments_drops_unreachable_entries() {
        let metadata = json!({
            "note": "kept regardless",
            "context_segments": [
                {"text": "public bit", "scopes": []},
                {"text": "vault bit", "scopes": ["vault-only"]},
                {"text": "shared bit", "scopes": ["public", "vault-only"]},
            ]
        });
        let filtered = filter_segments(&metadata, &scopes(&["public"]));
        assert_eq!(filtered["note"], "kept regardless");
        let segments = filtered["context_segments"].as_array().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0]["text"], "public bit");
        assert_eq!(segments[1]["text"], "shared bit");
    }

    #[test]
    fn filter_segments_passes_through_metadata_without_segments() {
        let metadata = json!({"plain": "value"});
        let filtered = filter_segments(&metadata, &scopes(&[]));
        assert_eq!(filtered, metadata);
    }

    #[test]
    fn config_default_matches_admin_scope_names() {
        let cfg = ScopeMediatorConfig::default();
        assert!(cfg.admin_scope_names.contains("vault-only"));
        assert!(cfg.admin_scope_names.contains("sensitive"));
        assert!(!cfg.strict_admin);
    }
}
