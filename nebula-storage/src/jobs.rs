//! Job CRUD.
//!
//! Jobs are the one record kind keyed by a human-readable id
//! (`YYYYQ#-NNNN`) rather than a uuid newtype — the id is allocated by the
//! store itself on create, not generated client-side.

use crate::rows::{metadata_col, opt_id_col};
use crate::Store;
use nebula_core::{
    AuditIdentity, EntityIdType, Job, JobPriority, NebulaAgentId, NebulaResult, StatusId,
    StoreError, Timestamp, UserId,
};
use tokio_postgres::Row;

pub struct NewJob {
    pub title: String,
    pub description: Option<String>,
    pub job_type: Option<String>,
    pub assignee_user_id: Option<UserId>,
    pub agent_id: Option<NebulaAgentId>,
    pub status_id: StatusId,
    pub priority: JobPriority,
    pub parent_job_id: Option<String>,
    pub due_at: Option<Timestamp>,
    pub metadata: serde_json::Value,
}

fn priority_str(p: JobPriority) -> &'static str {
    match p {
        JobPriority::Low => "low",
        JobPriority::Medium => "medium",
        JobPriority::High => "high",
        JobPriority::Critical => "critical",
    }
}

fn parse_priority(s: &str) -> Result<JobPriority, StoreError> {
    match s {
        "low" => Ok(JobPriority::Low),
        "medium" => Ok(JobPriority::Medium),
        "high" => Ok(JobPriority::High),
        "critical" => Ok(JobPriority::Critical),
        other => Err(StoreError::QueryFailed {
            reason: format!("unknown job priority: {other}"),
        }),
    }
}

fn from_row(row: &Row) -> Result<Job, StoreError> {
    Ok(Job {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        job_type: row.get("job_type"),
        assignee_user_id: opt_id_col(row, "assignee_user_id"),
        agent_id: opt_id_col(row, "agent_id"),
        status_id: StatusId::new(row.get("status_id")),
        priority: parse_priority(row.get("priority"))?,
        parent_job_id: row.get("parent_job_id"),
        due_at: row.get("due_at"),
        completed_at: row.get("completed_at"),
        metadata: metadata_col(row, "metadata"),
    })
}

impl Store {
    pub async fn create_job(&self, new: &NewJob, identity: AuditIdentity) -> NebulaResult<Job> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("jobs/create")?;
        let row = client
            .query_one(
                &*sql,
                &[
                    &new.title,
                    &new.description,
                    &new.job_type,
                    &new.assignee_user_id.map(|id| id.as_uuid()),
                    &new.agent_id.map(|id| id.as_uuid()),
                    &new.status_id.as_uuid(),
                    &priority_str(new.priority),
                    &new.parent_job_id,
                    &new.due_at,
                    &new.metadata,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        from_row(&row).map_err(Into::into)
    }

    pub async fn get_job(&self, id: &str) -> NebulaResult<Option<Job>> {
        let client = self.client().await?;
        let sql = self.queries().get("jobs/get")?;
        let row = client
            .query_opt(&*sql, &[&id])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        row.as_ref().map(from_row).transpose().map_err(Into::into)
    }

    pub async fn update_job(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
        priority: Option<JobPriority>,
        due_at: Option<Timestamp>,
        metadata: Option<&serde_json::Value>,
        identity: AuditIdentity,
    ) -> NebulaResult<Job> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("jobs/update")?;
        let updated = client
            .execute(
                &*sql,
                &[
                    &id,
                    &title,
                    &description,
                    &priority.map(priority_str),
                    &due_at,
                    &metadata,
                ],
            )
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(not_found(id));
        }
        self.get_job(id).await?.ok_or_else(|| not_found(id))
    }

    pub async fn update_job_status(
        &self,
        id: &str,
        status_id: StatusId,
        completed_at: Option<Timestamp>,
        identity: AuditIdentity,
    ) -> NebulaResult<Job> {
        let client = self.audited_client(identity).await?;
        let sql = self.queries().get("jobs/update_status")?;
        let updated = client
            .execute(&*sql, &[&id, &status_id.as_uuid(), &completed_at])
            .await
            .map_err(|e| StoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        if updated == 0 {
            return Err(not_found(id));
        }
        self.get_job(id).await?.ok_or_else(|| not_found(id))
    }
}

fn not_found(id: &str) -> nebula_core::NebulaError {
    StoreError::NotFoundByKey {
        kind: "job",
        key: id.to_string(),
    }
    .into()
}
