//! Bootstrap enrollment session persistence (C5's `enrollStart`/`enrollWait`/
//! `enrollRedeem` flow, spec.md §4.5). A session always carries the
//! `ApprovalRequest` that gates its `pending_approval -> approved` edge; the
//! state machine for that edge lives in `nebula-approvals`.

use crate::rows::id_col;
use crate::Store;
use nebula_core::{
    ApprovalRequestId, EnrollmentSession, EnrollmentSessionId, EnrollmentStatus, EntityIdType,
    NebulaAgentId, NebulaResult, StoreError, Timestamp,
};
use tokio_postgres::Row;

fn status_str(s: EnrollmentStatus) -> &'static str {
    match s {
        EnrollmentStatus::PendingApproval => "pending_approval",
        EnrollmentStatus::Approved => "approved",
        EnrollmentStatus::Rejected => "rejected",
        EnrollmentStatus::Expired => "expired",
        EnrollmentStatus::Redeemed => "redeemed",
    }
}

fn parse_status(s: &str) -> Result<EnrollmentStatus, StoreError> {
    match s {
        "pending_approval" => Ok(EnrollmentStatus::PendingApproval),
        "approved" => Ok(EnrollmentStatus::Approved),
        "rejected" => Ok(EnrollmentStatus::Rejected),
        "expired" => Ok(EnrollmentStatus::Expired),
        "redeemed" => Ok(EnrollmentStatus::Redeemed),
        other => Err(StoreError::QueryFailed {
            reason: format!("unknown enrollment status: {other}"),
        }),
    }
}

fn from_row(row: &Row) -> Result<EnrollmentSession, StoreError> {
    Ok(EnrollmentSession {
        id: id_col(row, "id"),
        agent_id: id_col(row, "agent_id"),
        enrollment_token_hash: row.get("enrollment_token_hash"),
        status: parse_status(row.get("status"))?,
        approval_request_id: id_col(row, "approval_request_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    })
}

pub struct NewEnrollmentSession {
    pub agent_id: NebulaAgentId,
    pub enrollment_token_hash: String,
    pub approval_request_id: ApprovalRequestId,
    pub expires_at: Timestamp,
}

impl Store {
    pub async fn create_enrollment_session(
        &self,
        new: &NewEnrollmentSession,
    ) -> NebulaResult<EnrollmentSession> {
        let client = self.client().await?;
        let sql = self.queries().get("enrollment/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.agent_id.as_uuid(),
                    &new.enrollment_token_hash,
                    &new.approval_request_id.as_uuid(),
                    &new.expires_at,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        from_row(&row).map_err(Into::into)
    }

    pub async fn get_enrollment_session(
        &self,
        id: EnrollmentSessionId,
    ) -> NebulaResult<Option<EnrollmentSession>> {
        let client = self.client().await?;
        let sql = self.queries().get("enrollment/get")?;
        let row = client
            .query_opt(&*sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        row.as_ref().map(from_row).transpose().map_err(Into::into)
    }

    /// `enrollRedeem` looks a session up by the hash of the token the agent
    /// presents, never by id — the id is never handed back to the agent.
    pub async fn find_enrollment_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> NebulaResult<Option<EnrollmentSession>> {
        let client = self.client().await?;
        let sql = self.queries().get("enrollment/find_by_token_hash")?;
        let row = client
            .query_opt(&*sql, &[&token_hash])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        row.as_ref().map(from_row).transpose().map_err(Into::into)
    }

    pub async fn update_enrollment_session_status(
        &self,
        id: EnrollmentSessionId,
        status: EnrollmentStatus,
    ) -> NebulaResult<EnrollmentSession> {
        let client = self.client().await?;
        let sql = self.queries().get("enrollment/update_status")?;
        let updated = client
            .execute(&*sql, &[&id.as_uuid(), &status_str(status)])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                kind: "enrollment_session",
                id: id.as_uuid(),
            }
            .into());
        }
        Ok(self
            .get_enrollment_session(id)
            .await?
            .ok_or(StoreError::NotFound {
                kind: "enrollment_session",
                id: id.as_uuid(),
            })?)
    }

    /// Atomic compare-and-set `approved -> redeemed`. Returns `Ok(None)`
    /// (not an error) when the row wasn't `approved` anymore — the caller
    /// maps that to `ApprovalError::AlreadyRedeemed`. This is what makes P6
    /// (at most one `enrollRedeem` ever succeeds for a given session) hold
    /// under concurrent redeem attempts.
    pub async fn redeem_enrollment_session(
        &self,
        id: EnrollmentSessionId,
    ) -> NebulaResult<Option<EnrollmentSession>> {
        let client = self.client().await?;
        let sql = self.queries().get("enrollment/redeem")?;
        let updated = client
            .execute(&*sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_enrollment_session(id).await
    }
}
