//! Authenticator (C3) — resolves a bearer credential to a [`Caller`] with
//! effective scopes.
//!
//! Grounded on `nebula_api/auth.py`'s `require_auth`/`generate_api_key`:
//! `Authorization: Bearer <key>` -> 8-char prefix lookup -> Argon2 verify ->
//! branch on the key's owner (`entity_id` vs `agent_id`) -> merge the key's
//! overlay scopes with the owner's. `secrecy` wraps the freshly generated
//! raw key so it can't accidentally end up in a `Debug` log before the
//! caller stores it.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use nebula_core::{
    ApiKey, AuthError, Caller, EntityIdType, NebulaAgentId, NebulaResult, StatusId, UserId,
};
use nebula_storage::{RegistryHandle, Store};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    /// Whether an absent credential on a bootstrap-eligible tool resolves to
    /// `Caller::Bootstrap` instead of `AuthError::MissingCredential`.
    pub bootstrap_enabled: bool,
    /// Local-insecure dev mode: bootstrap is permitted over any transport,
    /// not just the loopback/trusted one production requires.
    pub local_insecure: bool,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            bootstrap_enabled: false,
            local_insecure: false,
        }
    }
}

#[derive(Clone)]
pub struct Authenticator {
    store: Store,
    registry: Arc<RegistryHandle>,
    config: AuthenticatorConfig,
}

/// A freshly minted API key. `raw` is shown to the caller exactly once; only
/// `prefix` and `key_hash` are persisted.
pub struct GeneratedApiKey {
    pub raw: SecretString,
    pub prefix: String,
    pub key_hash: String,
}

/// `generate_api_key`: a `nbl_`-prefixed random token, its first 8 chars as
/// the lookup prefix, and an Argon2 hash of the full token for storage.
pub fn generate_api_key() -> GeneratedApiKey {
    let mut bytes = [0u8; 33];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = format!("nbl_{}", URL_SAFE_NO_PAD.encode(bytes));
    let prefix = raw.chars().take(8).collect();
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let key_hash = Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .expect("argon2 hashing with a generated salt never fails")
        .to_string();
    GeneratedApiKey {
        raw: SecretString::new(raw),
        prefix,
        key_hash,
    }
}

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

fn verify(raw: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok()
}

/// `_merge_scopes`: non-empty key scopes narrow the owner's scopes; empty
/// key scopes inherit the owner's scopes verbatim (P9).
fn merge_scopes(key_scopes: &[String], owner_scopes: &HashSet<String>) -> HashSet<String> {
    if key_scopes.is_empty() {
        return owner_scopes.clone();
    }
    key_scopes
        .iter()
        .filter(|s| owner_scopes.contains(*s))
        .cloned()
        .collect()
}

impl Authenticator {
    pub fn new(store: Store, registry: Arc<RegistryHandle>, config: AuthenticatorConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// `require_auth`. `bearer` is the raw token from the `Authorization:
    /// Bearer <token>` header, already stripped of the `Bearer ` prefix by
    /// the transport layer.
    pub async fn authenticate(&self, bearer: Option<&str>) -> NebulaResult<Caller> {
        let Some(raw) = bearer else {
            return self.bootstrap_or_missing();
        };
        if raw.len() < 8 {
            return Err(AuthError::InvalidCredential.into());
        }
        let prefix = &raw[..8];

        let Some(key) = self.store.get_api_key_by_prefix(prefix).await? else {
            return Err(AuthError::InvalidCredential.into());
        };
        if !verify(raw, &key.key_hash) {
            return Err(AuthError::InvalidCredential.into());
        }
        if key.revoked_at.is_some() {
            return Err(AuthError::Revoked.into());
        }
        let now = chrono::Utc::now();
        if !key.is_active(now) {
            return Err(AuthError::Expired.into());
        }

        self.touch_last_used(&key);

        if let Some(user_id) = key.entity_id {
            return self.resolve_user(user_id, &key).await;
        }
        if let Some(agent_id) = key.agent_id {
            return self.resolve_agent(agent_id, &key).await;
        }
        Err(AuthError::InvalidCredential.into())
    }

    fn bootstrap_or_missing(&self) -> NebulaResult<Caller> {
        if self.config.bootstrap_enabled {
            Ok(Caller::Bootstrap)
        } else {
            Err(AuthError::MissingCredential.into())
        }
    }

    /// Fires the `last_used_at` update without blocking the request path
    /// (spec.md §9's best-effort note) — a detached task using its own
    /// short-lived pool checkout, never the caller's connection.
    fn touch_last_used(&self, key: &ApiKey) {
        let store = self.store.clone();
        let id = key.id;
        let now = chrono::Utc::now();
        tokio::spawn(async move {
            if let Err(err) = store.update_api_key_last_used(id, now).await {
                tracing::warn!(error = %err, "failed to update api key last_used_at");
            }
        });
    }

    async fn resolve_user(&self, user_id: UserId, key: &ApiKey) -> NebulaResult<Caller> {
        let owner_scope_ids = self
            .store
            .get_user_owner_scopes(user_id)
            .await?
            .unwrap_or_default();
        let registry = self.registry.current();
        let owner_scope_names: HashSet<String> = owner_scope_ids
            .iter()
            .filter_map(|id| registry.scope_name_of(*id))
            .map(str::to_string)
            .collect();
        let effective_scope_names = merge_scopes(&key.scopes, &owner_scope_names);
        Ok(Caller::User {
            user_id,
            owner_scope_names,
            effective_scope_names,
        })
    }

    async fn resolve_agent(&self, agent_id: NebulaAgentId, key: &ApiKey) -> NebulaResult<Caller> {
        let Some(agent) = self.store.get_agent(agent_id).await? else {
            return Err(AuthError::InvalidCredential.into());
        };
        let registry = self.registry.current();
        if registry.statuses.name_of(agent.status_id) != Some("active") {
            return Err(AuthError::InvalidCredential.into());
        }
        let owner_scope_names: HashSet<String> = agent
            .owner_scope_ids
            .iter()
            .filter_map(|id| registry.scope_name_of(*id))
            .map(str::to_string)
            .collect();
        let effective_scope_names = merge_scopes(&key.scopes, &owner_scope_names);
        Ok(Caller::Agent {
            agent_id,
            trusted: !agent.requires_approval,
            owner_scope_names,
            effective_scope_names,
            capabilities: agent.capabilities.into_iter().collect(),
        })
    }
}

/// Convenience accessor some callers need to avoid re-resolving the
/// "inactive" status id from scratch — kept here since it's authenticator
/// housekeeping (name matches the source's pending-status lookup in
/// `register_agent`), not a general registry helper.
pub fn inactive_status_id(registry: &RegistryHandle) -> Option<StatusId> {
    registry.current().statuses.id_of("inactive")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_scopes_empty_key_inherits_owner() {
        let owner: HashSet<String> = ["public", "team"].into_iter().map(String::from).collect();
        let merged = merge_scopes(&[], &owner);
        assert_eq!(merged, owner);
    }

    #[test]
    fn merge_scopes_narrows_to_intersection() {
        let owner: HashSet<String> = ["public", "team", "vault-only"]
            .into_iter()
            .map(String::from)
            .collect();
        let key_scopes = vec!["team".to_string(), "unrelated".to_string()];
        let merged = merge_scopes(&key_scopes, &owner);
        assert_eq!(merged, ["team"].into_iter().map(String::from).collect());
    }

    #[test]
    fn generated_key_hash_verifies_against_its_own_raw() {
        let generated = generate_api_key();
        assert!(generated.raw.expose_secret().starts_with("nbl_"));
        assert_eq!(generated.prefix.len(), 8);
        assert!(verify(generated.raw.expose_secret(), &generated.key_hash));
        assert!(!verify("nbl_wrong", &generated.key_hash));
    }
}
