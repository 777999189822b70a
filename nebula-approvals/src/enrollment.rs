//! Bootstrap enrollment sub-protocol (spec.md §4.5): `enrollStart` /
//! `enrollWait` / `enrollRedeem`, the three tool calls a bootstrap caller
//! may invoke before it has any credential of its own.
//!
//! Grounded on `nebula_api/routes/agents.py`'s `register_agent` (the
//! name-uniqueness check, the agent-row-plus-approval-request pairing) and
//! spec.md §4.5's long-poll/CAS-redeem description directly, since the
//! Python original exposes enrollment only through its MCP surface (not a
//! file read verbatim this session) — the conditional-UPDATE shape mirrors
//! `approvals.rs`'s `resolve_approval_request`/`redeem_enrollment_session`.

use nebula_core::{
    ApprovalError, ApprovalStatus, EnrollmentSessionId, EnrollmentStatus, EntityIdType,
    ExecutorError, NebulaAgentId, NebulaResult,
};
use nebula_storage::{NewAgent, NewApiKey, NewApprovalRequest, NewEnrollmentSession, RegistryHandle, Store};
use rand::RngCore;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `T_enroll`: how long an enrollment session stays redeemable after
/// creation before `enrollWait`/`enrollRedeem` start refusing it.
pub const ENROLLMENT_SESSION_TTL_MINUTES: i64 = 15;

const ENROLLMENT_TOKEN_BYTES: usize = 36;
const LONG_POLL_MAX_SECONDS: u64 = 60;

#[derive(Debug, Clone, serde::Serialize)]
pub struct EnrollmentOutcome {
    pub session_id: EnrollmentSessionId,
    /// The raw `nbe_`-prefixed token, returned to the caller exactly once.
    pub enrollment_token: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EnrollmentWaitOutcome {
    pub status: EnrollmentStatus,
    pub can_redeem: bool,
    pub retry_after_ms: Option<u64>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RedeemedKey {
    pub api_key: String,
    pub agent_id: NebulaAgentId,
    pub scopes: Vec<String>,
}

fn hash_token(token: &str) -> String {
    hex::encode(nebula_core::compute_content_hash(token.as_bytes()))
}

#[derive(Clone)]
pub struct EnrollmentEngine {
    store: Store,
    registry: Arc<RegistryHandle>,
}

impl EnrollmentEngine {
    pub fn new(store: Store, registry: Arc<RegistryHandle>) -> Self {
        Self { store, registry }
    }

    /// `enrollStart`. Rejects a colliding agent name, creates the agent row
    /// `inactive`/`requires_approval = true`, pairs it with a
    /// `register_agent` approval request, and mints the one-time token.
    pub async fn enroll_start(
        &self,
        name: &str,
        requested_scopes: &[String],
        requested_requires_approval: bool,
        capabilities: Vec<String>,
    ) -> NebulaResult<EnrollmentOutcome> {
        if self.store.find_agent_by_name(name).await?.is_some() {
            return Err(ExecutorError::Conflict {
                kind: "agent".to_string(),
                reason: format!("name '{name}' already registered"),
            }
            .into());
        }

        let registry = self.registry.current();
        let scope_ids = registry.require_scopes(requested_scopes)?;
        let inactive_status_id = nebula_context::inactive_status_id(&self.registry).ok_or_else(|| {
            nebula_core::TaxonomyError::Unknown {
                label: "status",
                name: "inactive".to_string(),
            }
        })?;
        drop(registry);

        let agent = self
            .store
            .create_agent(&NewAgent {
                name: name.to_string(),
                description: None,
                scope_ids,
                capabilities: capabilities.clone(),
                status_id: inactive_status_id,
                requires_approval: true,
            })
            .await?;

        let change_details = serde_json::json!({
            "agent_id": agent.id,
            "name": agent.name,
            "requested_scopes": requested_scopes,
            "requested_requires_approval": requested_requires_approval,
            "capabilities": capabilities,
        });
        let approval = self
            .store
            .create_approval_request(&NewApprovalRequest {
                request_type: "register_agent".to_string(),
                requested_by_agent_id: agent.id,
                change_details,
                linked_record_id: None,
                related_job_id: None,
            })
            .await?;

        let mut token_bytes = [0u8; ENROLLMENT_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut token_bytes);
        let enrollment_token = format!(
            "nbe_{}",
            base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, token_bytes)
        );

        let expires_at = chrono::Utc::now() + chrono::Duration::minutes(ENROLLMENT_SESSION_TTL_MINUTES);
        let session = self
            .store
            .create_enrollment_session(&NewEnrollmentSession {
                agent_id: agent.id,
                enrollment_token_hash: hash_token(&enrollment_token),
                approval_request_id: approval.id,
                expires_at,
            })
            .await?;

        Ok(EnrollmentOutcome {
            session_id: session.id,
            enrollment_token,
        })
    }

    /// `enrollWait`: cancellable long-poll over the session's approval row.
    /// Returns the instant the row leaves `pending`, or on timeout, a
    /// `pending_approval` status with a `retryAfterMs` hint. Because this
    /// only mutates the session row (via `update_enrollment_session_status`)
    /// at the moment it observes a terminal approval outcome, a caller that
    /// drops/cancels the future mid-sleep leaves the session untouched —
    /// safe to retry.
    pub async fn enroll_wait(
        &self,
        session_id: EnrollmentSessionId,
        token: &str,
        timeout_seconds: u64,
    ) -> NebulaResult<EnrollmentWaitOutcome> {
        let timeout_seconds = timeout_seconds.min(LONG_POLL_MAX_SECONDS);
        let session = self
            .store
            .get_enrollment_session(session_id)
            .await?
            .ok_or(ApprovalError::EnrollmentNotFound)?;
        if hash_token(token) != session.enrollment_token_hash {
            return Err(ApprovalError::EnrollmentNotFound.into());
        }
        if session.expires_at <= chrono::Utc::now() {
            return Ok(EnrollmentWaitOutcome {
                status: EnrollmentStatus::Expired,
                can_redeem: false,
                retry_after_ms: None,
                reason: Some("enrollment session expired".to_string()),
            });
        }

        let deadline = Instant::now() + Duration::from_secs(timeout_seconds);
        let mut backoff = Duration::from_millis(200);

        loop {
            let approval = self
                .store
                .get_approval_request(session.approval_request_id)
                .await?
                .ok_or(ApprovalError::NotFound)?;

            match approval.status {
                ApprovalStatus::Pending => {
                    if Instant::now() >= deadline {
                        return Ok(EnrollmentWaitOutcome {
                            status: EnrollmentStatus::PendingApproval,
                            can_redeem: false,
                            retry_after_ms: Some(timeout_seconds * 1000),
                            reason: None,
                        });
                    }
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    tokio::time::sleep(backoff.min(remaining)).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                }
                ApprovalStatus::Approved => {
                    if session.status != EnrollmentStatus::Approved {
                        self.store
                            .update_enrollment_session_status(session_id, EnrollmentStatus::Approved)
                            .await?;
                    }
                    return Ok(EnrollmentWaitOutcome {
                        status: EnrollmentStatus::Approved,
                        can_redeem: true,
                        retry_after_ms: None,
                        reason: None,
                    });
                }
                ApprovalStatus::Rejected | ApprovalStatus::ApprovedFailed => {
                    if session.status != EnrollmentStatus::Rejected {
                        self.store
                            .update_enrollment_session_status(session_id, EnrollmentStatus::Rejected)
                            .await?;
                    }
                    return Ok(EnrollmentWaitOutcome {
                        status: EnrollmentStatus::Rejected,
                        can_redeem: false,
                        retry_after_ms: None,
                        reason: Some("registration was rejected".to_string()),
                    });
                }
            }
        }
    }

    /// `enrollRedeem`: atomic compare-and-set `approved -> redeemed`
    /// guarantees P6 (at most one redeem succeeds) even under concurrent
    /// callers racing the same token.
    pub async fn enroll_redeem(
        &self,
        session_id: EnrollmentSessionId,
        token: &str,
    ) -> NebulaResult<RedeemedKey> {
        let session = self
            .store
            .get_enrollment_session(session_id)
            .await?
            .ok_or(ApprovalError::EnrollmentNotFound)?;
        if hash_token(token) != session.enrollment_token_hash {
            return Err(ApprovalError::EnrollmentNotFound.into());
        }
        if session.expires_at <= chrono::Utc::now() {
            return Err(ApprovalError::EnrollmentExpired.into());
        }

        let Some(redeemed) = self.store.redeem_enrollment_session(session_id).await? else {
            return Err(ApprovalError::AlreadyRedeemed.into());
        };

        let agent = self
            .store
            .get_agent(redeemed.agent_id)
            .await?
            .ok_or_else(|| ExecutorError::NotFound {
                kind: "agent".to_string(),
                id: redeemed.agent_id.as_uuid().to_string(),
            })?;

        let generated = nebula_context::generate_api_key();
        self.store
            .create_api_key(&NewApiKey {
                key_hash: generated.key_hash.clone(),
                prefix: generated.prefix.clone(),
                entity_id: None,
                agent_id: Some(agent.id),
                scopes: Vec::new(),
                label: "enrollment".to_string(),
                expires_at: None,
            })
            .await?;

        let registry = self.registry.current();
        let scope_names: Vec<String> = agent
            .owner_scope_ids
            .iter()
            .filter_map(|id| registry.scope_name_of(*id))
            .map(str::to_string)
            .collect();

        Ok(RedeemedKey {
            api_key: generated.raw.expose_secret().to_string(),
            agent_id: agent.id,
            scopes: scope_names,
        })
    }
}
