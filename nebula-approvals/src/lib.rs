//! Nebula Approval Engine (C5) and bootstrap enrollment sub-protocol.
//!
//! Grounded on `nebula_api/routes/approvals.py` (the REST surface: `GET
//! /pending`, `GET /{id}`, `POST /{id}/approve`, `POST /{id}/reject`, `GET
//! /{id}/diff`) and `nebula_mcp/helpers.py` (`create_approval_request`,
//! `ensure_approval_capacity`, `approve_request`, `reject_request`,
//! `get_approval_diff`). The conditional-UPDATE state machine itself lives
//! one layer down in `nebula-storage::approvals`/`enrollment`; this crate
//! owns the transaction-ordering rules spec.md §4.4 describes and the
//! executor dispatch an approval unblocks.

mod diff;
mod enrollment;
mod gate;

pub use diff::ApprovalDiff;
pub use enrollment::{EnrollmentEngine, EnrollmentOutcome, EnrollmentWaitOutcome};
pub use gate::{ApprovalGate, ApprovalRequiredResponse};

use nebula_core::{
    ApprovalError, ApprovalRequest, ApprovalRequestId, ApprovalStatus, AuditIdentity,
    EntityIdType, ExecutorError, NebulaAgentId, NebulaResult, RegisterAgentGrants,
    RegisterAgentInput, ScopeRecordId, StatusId, UserId,
};
use nebula_storage::{NewApprovalRequest, RegistryHandle, Store};
use std::sync::Arc;

/// The number of pending requests a single agent may accumulate before
/// `ensure_approval_capacity` starts rejecting new ones with
/// `ApprovalError::PendingCapExceeded` (maps to HTTP 429 at the transport
/// boundary).
pub const DEFAULT_MAX_PENDING_PER_AGENT: u32 = 50;

/// Outcome of a successful `approve`: the resolved request plus whatever the
/// executor it unblocked returned, serialized generically since different
/// actions produce different record shapes.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ApprovalOutcome {
    pub request: ApprovalRequest,
    pub result: serde_json::Value,
}

#[derive(Clone)]
pub struct ApprovalEngine {
    store: Store,
    registry: Arc<RegistryHandle>,
    max_pending_per_agent: u32,
}

/// Runs a named action's executor against a payload, used by `approve` to
/// actually apply the change once the row has flipped out of `pending`.
/// Implemented by `nebula-agents`'s executor registry; kept as a trait here
/// so this crate doesn't depend on `nebula-agents` (which itself has no
/// need of the approval engine) and the two compose only at the wiring
/// layer (`nebula-api`).
#[async_trait::async_trait]
pub trait ApprovalExecutor: Send + Sync {
    /// Applies `action` with `payload` under `reviewer`'s audit identity.
    /// Returns the linked record id (for `link_approval_record`) and the
    /// serialized result to hand back to the caller.
    async fn execute(
        &self,
        action: &str,
        payload: &serde_json::Value,
        reviewer: AuditIdentity,
    ) -> NebulaResult<(String, serde_json::Value)>;
}

impl ApprovalEngine {
    pub fn new(store: Store, registry: Arc<RegistryHandle>) -> Self {
        Self {
            store,
            registry,
            max_pending_per_agent: DEFAULT_MAX_PENDING_PER_AGENT,
        }
    }

    pub fn with_max_pending_per_agent(mut self, limit: u32) -> Self {
        self.max_pending_per_agent = limit;
        self
    }

    /// `ensure_approval_capacity`: rejects a new proposal once an agent has
    /// `max_pending_per_agent` requests already awaiting review.
    pub async fn ensure_capacity(&self, agent_id: NebulaAgentId) -> NebulaResult<()> {
        let pending = self
            .store
            .count_pending_approval_requests_for_agent(agent_id)
            .await?;
        if pending >= self.max_pending_per_agent {
            return Err(ApprovalError::PendingCapExceeded {
                limit: self.max_pending_per_agent,
            }
            .into());
        }
        Ok(())
    }

    /// `create_approval_request`.
    pub async fn create(
        &self,
        action: &str,
        agent_id: NebulaAgentId,
        payload: serde_json::Value,
        related_job_id: Option<String>,
    ) -> NebulaResult<ApprovalRequest> {
        self.ensure_capacity(agent_id).await?;
        self.store
            .create_approval_request(&NewApprovalRequest {
                request_type: action.to_string(),
                requested_by_agent_id: agent_id,
                change_details: payload,
                linked_record_id: None,
                related_job_id,
            })
            .await
    }

    pub async fn get(&self, id: ApprovalRequestId) -> NebulaResult<ApprovalRequest> {
        self.store
            .get_approval_request(id)
            .await?
            .ok_or_else(|| ApprovalError::NotFound.into())
    }

    /// `get_pending_approvals_all`.
    pub async fn list_pending(&self) -> NebulaResult<Vec<ApprovalRequest>> {
        self.store.list_pending_approval_requests().await
    }

    /// `get_approval_diff`.
    pub async fn diff(&self, id: ApprovalRequestId) -> NebulaResult<ApprovalDiff> {
        let request = self.get(id).await?;
        diff::compute(&self.store, &request).await
    }

    /// `approve_request`: flips the row to `approved` (conditional on it
    /// still being `pending`) *before* running the executor, then runs it.
    /// A failure from the executor is recorded durably in a second,
    /// independent transition to `approved_failed` — this happens even if
    /// the executor's own write rolled back, so the approval record never
    /// silently claims a change took effect when it didn't.
    pub async fn approve(
        &self,
        id: ApprovalRequestId,
        reviewer: UserId,
        executor: &dyn ApprovalExecutor,
    ) -> NebulaResult<ApprovalOutcome> {
        let Some(resolved) = self
            .store
            .resolve_approval_request(id, ApprovalStatus::Approved, reviewer, None, None)
            .await?
        else {
            return Err(ApprovalError::AlreadyProcessed.into());
        };

        match executor
            .execute(
                &resolved.request_type,
                &resolved.change_details,
                AuditIdentity::User(reviewer),
            )
            .await
        {
            Ok((linked_record_id, result)) => {
                self.store
                    .link_approval_record(id, &linked_record_id)
                    .await?;
                Ok(ApprovalOutcome {
                    request: resolved,
                    result,
                })
            }
            Err(err) => {
                self.store
                    .mark_approval_failed(id, &err.to_string())
                    .await?;
                Err(err)
            }
        }
    }

    /// `reject_request`.
    pub async fn reject(
        &self,
        id: ApprovalRequestId,
        reviewer: UserId,
        review_notes: Option<&str>,
    ) -> NebulaResult<ApprovalRequest> {
        self.store
            .resolve_approval_request(id, ApprovalStatus::Rejected, reviewer, review_notes, None)
            .await?
            .ok_or_else(|| ApprovalError::AlreadyProcessed.into())
    }

    /// `register_agent` approvals carry an extra reviewer-grant step: the
    /// approved scopes/`requires_approval` may differ from what the agent
    /// originally requested. Resolves the row with the grants recorded in
    /// `review_details` so `diff`/history shows what was actually granted,
    /// then activates the agent in place of running it through the generic
    /// executor registry (activation touches the `agents` table directly,
    /// not any of the resource tables `nebula-agents` mediates).
    pub async fn approve_register_agent(
        &self,
        id: ApprovalRequestId,
        reviewer: UserId,
        grants: RegisterAgentGrants,
        active_status_id: StatusId,
    ) -> NebulaResult<ApprovalOutcome> {
        let request = self.get(id).await?;
        if request.request_type != "register_agent" {
            return Err(ApprovalError::GrantsNotApplicable.into());
        }
        let review_details = serde_json::to_value(&grants).ok();

        let Some(resolved) = self
            .store
            .resolve_approval_request(
                id,
                ApprovalStatus::Approved,
                reviewer,
                None,
                review_details.as_ref(),
            )
            .await?
        else {
            return Err(ApprovalError::AlreadyProcessed.into());
        };

        let input: RegisterAgentInput = serde_json::from_value(resolved.change_details.clone())
            .map_err(|e| ExecutorError::Invalid {
                reason: e.to_string(),
            })?;

        let grant_scope_ids: Option<Vec<ScopeRecordId>> = match &grants.grant_scopes {
            Some(names) => Some(self.registry.current().require_scopes(names)?),
            None => None,
        };

        match self
            .store
            .activate_agent(
                input.agent_id,
                active_status_id,
                grant_scope_ids.as_deref(),
                grants.grant_requires_approval,
                AuditIdentity::User(reviewer),
            )
            .await
        {
            Ok(agent) => {
                self.store
                    .link_approval_record(id, &input.agent_id.as_uuid().to_string())
                    .await?;
                Ok(ApprovalOutcome {
                    request: resolved,
                    result: serde_json::to_value(&agent).unwrap_or(serde_json::Value::Null),
                })
            }
            Err(err) => {
                self.store
                    .mark_approval_failed(id, &err.to_string())
                    .await?;
                Err(err)
            }
        }
    }
}
