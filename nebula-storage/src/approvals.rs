//! Approval request persistence. The state machine (create/approve/reject
//! transition rules) lives in `nebula-approvals`; this module only issues
//! the conditional-UPDATE SQL spec.md §4.4 describes (an approve/reject can
//! only ever apply once — the `WHERE status = 'pending'` guard is in the
//! query text, not duplicated here).

use crate::rows::{id_col, metadata_col, opt_id_col};
use crate::Store;
use nebula_core::{
    ApprovalRequest, ApprovalRequestId, ApprovalStatus, EntityIdType, NebulaAgentId, NebulaResult,
    StoreError, Timestamp, UserId,
};
use tokio_postgres::Row;

fn status_str(s: ApprovalStatus) -> &'static str {
    match s {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::ApprovedFailed => "approved_failed",
        ApprovalStatus::Rejected => "rejected",
    }
}

fn parse_status(s: &str) -> Result<ApprovalStatus, StoreError> {
    match s {
        "pending" => Ok(ApprovalStatus::Pending),
        "approved" => Ok(ApprovalStatus::Approved),
        "approved_failed" => Ok(ApprovalStatus::ApprovedFailed),
        "rejected" => Ok(ApprovalStatus::Rejected),
        other => Err(StoreError::QueryFailed {
            reason: format!("unknown approval status: {other}"),
        }),
    }
}

fn from_row(row: &Row) -> Result<ApprovalRequest, StoreError> {
    Ok(ApprovalRequest {
        id: id_col(row, "id"),
        request_type: row.get("request_type"),
        requested_by_agent_id: id_col(row, "requested_by_agent_id"),
        change_details: metadata_col(row, "change_details"),
        status: parse_status(row.get("status"))?,
        reviewed_by_user_id: opt_id_col(row, "reviewed_by_user_id"),
        reviewed_at: row.get("reviewed_at"),
        review_notes: row.get("review_notes"),
        review_details: row.get::<_, Option<serde_json::Value>>("review_details"),
        linked_record_id: row.get("linked_record_id"),
        related_job_id: row.get("related_job_id"),
    })
}

pub struct NewApprovalRequest {
    pub request_type: String,
    pub requested_by_agent_id: NebulaAgentId,
    pub change_details: serde_json::Value,
    pub linked_record_id: Option<String>,
    pub related_job_id: Option<String>,
}

impl Store {
    pub async fn create_approval_request(
        &self,
        new: &NewApprovalRequest,
    ) -> NebulaResult<ApprovalRequest> {
        let client = self.client().await?;
        let sql = self.queries().get("approvals/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.request_type,
                    &new.requested_by_agent_id.as_uuid(),
                    &new.change_details,
                    &new.linked_record_id,
                    &new.related_job_id,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        from_row(&row).map_err(Into::into)
    }

    pub async fn get_approval_request(
        &self,
        id: ApprovalRequestId,
    ) -> NebulaResult<Option<ApprovalRequest>> {
        let client = self.client().await?;
        let sql = self.queries().get("approvals/get")?;
        let row = client
            .query_opt(&*sql, &[&id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        row.as_ref().map(from_row).transpose().map_err(Into::into)
    }

    /// Every request with `status = 'pending'`, newest first. Used both by
    /// the admin `GET /pending` route and by `ensure_approval_capacity`'s
    /// per-agent count.
    pub async fn list_pending_approval_requests(&self) -> NebulaResult<Vec<ApprovalRequest>> {
        let client = self.client().await?;
        let sql = self.queries().get("approvals/list_pending")?;
        let rows = client
            .query(&*sql, &[])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        rows.iter()
            .map(from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    pub async fn count_pending_approval_requests_for_agent(
        &self,
        agent_id: NebulaAgentId,
    ) -> NebulaResult<u32> {
        let client = self.client().await?;
        let sql = self
            .queries()
            .get("approvals/count_pending_for_agent")?;
        let row = client
            .query_one(&*sql, &[&agent_id.as_uuid()])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(row.get::<_, i64>(0) as u32)
    }

    /// Conditional transition out of `pending`. Returns `Ok(None)` (not an
    /// error) when the row wasn't pending anymore — the caller maps that to
    /// `ApprovalError::AlreadyProcessed`.
    pub async fn resolve_approval_request(
        &self,
        id: ApprovalRequestId,
        outcome: ApprovalStatus,
        reviewed_by_user_id: UserId,
        review_notes: Option<&str>,
        review_details: Option<&serde_json::Value>,
    ) -> NebulaResult<Option<ApprovalRequest>> {
        let client = self.client().await?;
        let sql = self.queries().get("approvals/resolve")?;
        let reviewed_at: Timestamp = chrono::Utc::now();
        let updated = client
            .execute(
                &*sql,
                &[
                    &id.as_uuid(),
                    &status_str(outcome),
                    &reviewed_by_user_id.as_uuid(),
                    &reviewed_at,
                    &review_notes,
                    &review_details,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_approval_request(id).await
    }

    /// Stamps the id of the record an approved executor produced. Runs in
    /// the same transaction as the executor's own mutation (see
    /// `Store::transaction`), so a rollback of one rolls back the other.
    pub async fn link_approval_record(
        &self,
        id: ApprovalRequestId,
        linked_record_id: &str,
    ) -> NebulaResult<()> {
        let client = self.client().await?;
        let sql = self.queries().get("approvals/link_record")?;
        client
            .execute(&*sql, &[&id.as_uuid(), &linked_record_id])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    /// Unconditional transition to `approved_failed`, used in the separate
    /// transaction that must durably record an executor failure even when
    /// the executor's own transaction rolled back. The row is already past
    /// `pending` at this point, so this does not re-check the status guard
    /// `resolve_approval_request` applies.
    pub async fn mark_approval_failed(
        &self,
        id: ApprovalRequestId,
        error_reason: &str,
    ) -> NebulaResult<()> {
        let client = self.client().await?;
        let sql = self.queries().get("approvals/mark_failed")?;
        client
            .execute(&*sql, &[&id.as_uuid(), &error_reason])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
