//! Approval Gate — the per-request check every mutating tool/route runs
//! immediately after authentication, grounded on `nebula_api/auth.py`'s
//! `maybe_check_agent_approval`: an untrusted agent's proposed action is
//! captured as a pending [`ApprovalRequest`] instead of being applied, and
//! the caller gets back a 202-shaped envelope instead of the mutated
//! record.

use crate::ApprovalEngine;
use nebula_core::{Caller, NebulaResult};

/// Mirrors the source's `{"status": "approval_required", "approval_request_id":
/// ..., "message": ...}` envelope.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ApprovalRequiredResponse {
    pub status: &'static str,
    pub approval_request_id: nebula_core::ApprovalRequestId,
    pub message: String,
}

pub struct ApprovalGate {
    engine: ApprovalEngine,
}

impl ApprovalGate {
    pub fn new(engine: ApprovalEngine) -> Self {
        Self { engine }
    }

    /// Returns `Some(response)` when the caller is an untrusted agent and
    /// the action must be deferred to review instead of executed directly;
    /// `None` means the caller may proceed straight to the executor. Trusted
    /// agents, users, and bootstrap callers (enrollment tools only, gated
    /// upstream) never hit the capture path.
    pub async fn intercept(
        &self,
        caller: &Caller,
        action: &str,
        payload: serde_json::Value,
        related_job_id: Option<String>,
    ) -> NebulaResult<Option<ApprovalRequiredResponse>> {
        let Caller::Agent {
            agent_id, trusted, ..
        } = caller
        else {
            return Ok(None);
        };
        if *trusted {
            return Ok(None);
        }

        let request = self
            .engine
            .create(action, *agent_id, payload, related_job_id)
            .await?;

        Ok(Some(ApprovalRequiredResponse {
            status: "approval_required",
            approval_request_id: request.id,
            message: format!("'{action}' requires reviewer approval before it takes effect"),
        }))
    }
}
