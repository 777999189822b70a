//! Error types for the Nebula API layer.
//!
//! `ErrorCode` is the ten-code taxonomy every transport-facing error maps
//! onto; `ApiError` is the envelope serialized back to the caller.
//! `From<NebulaError>` is where the component error taxonomy (`nebula-core`)
//! is collapsed onto these ten codes per the propagation policy: scope
//! denials never bubble as 500, executor validation maps to 400, uniqueness
//! conflicts to 409, and anything left over from the store layer is logged
//! with its real cause and returned to the caller as an opaque 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nebula_core::{
    ApprovalError, AuthError, ConfigError, ExecutorError, NebulaError, ScopeError, StoreError,
    TaxonomyError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The ten error codes a Nebula response may carry, per the external
/// interface contract. `SCREAMING_SNAKE_CASE` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No `Authorization` header on a route that requires one.
    MissingAuth,
    /// The presented credential doesn't resolve to an active caller.
    InvalidAuth,
    /// Authenticated, but the caller's scopes don't cover this record.
    Forbidden,
    /// No record of the requested kind exists at this id.
    NotFound,
    /// The request body failed field-level validation.
    InvalidInput,
    /// The requested change collides with existing state.
    Conflict,
    /// Too many requests; retry later.
    RateLimited,
    /// The caller must complete bootstrap enrollment first.
    EnrollmentRequired,
    /// The action was captured for review instead of applied.
    ApprovalRequired,
    /// An unmapped failure; the real cause is logged, not returned.
    Internal,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::MissingAuth | ErrorCode::InvalidAuth => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::EnrollmentRequired => StatusCode::FORBIDDEN,
            ErrorCode::ApprovalRequired => StatusCode::ACCEPTED,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::MissingAuth => "authentication required",
            ErrorCode::InvalidAuth => "invalid or expired credential",
            ErrorCode::Forbidden => "not permitted",
            ErrorCode::NotFound => "not found",
            ErrorCode::InvalidInput => "invalid input",
            ErrorCode::Conflict => "conflicts with existing state",
            ErrorCode::RateLimited => "rate limited",
            ErrorCode::EnrollmentRequired => "enrollment required",
            ErrorCode::ApprovalRequired => "approval required",
            ErrorCode::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The JSON envelope every error response carries. `NOT_FOUND` and
/// `FORBIDDEN` are kept to equivalent verbosity everywhere they're raised —
/// callers get `NotFound` whenever revealing a record's existence would
/// itself leak information the scope check is meant to withhold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn missing_auth() -> Self {
        Self::from_code(ErrorCode::MissingAuth)
    }

    pub fn invalid_auth() -> Self {
        Self::from_code(ErrorCode::InvalidAuth)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(kind: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{kind} not found"))
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn rate_limited(retry_after_secs: Option<u64>) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("rate limited, retry after {secs}s"),
            None => "rate limited".to_string(),
        };
        Self::new(ErrorCode::RateLimited, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// A bootstrap caller reached an action other than the three enrollment
    /// tools. Carries the `next_steps` hint the spec's tool surface returns
    /// alongside the code so a fresh agent knows what to call instead.
    pub fn enrollment_required() -> Self {
        Self::from_code(ErrorCode::EnrollmentRequired).with_details(serde_json::json!({
            "next_steps": ["agent_enroll_start", "agent_enroll_wait", "agent_enroll_redeem"],
        }))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// The on-the-wire shape: `{"detail": {"error": {"code", "message"}}}` per
/// the external interface contract — `details` (field-level extras) rides
/// inside the inner `error` object too, when present.
#[derive(Serialize)]
struct ErrorDetail {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct DetailWrapper {
    detail: ErrorEnvelope,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = DetailWrapper {
            detail: ErrorEnvelope {
                error: ErrorDetail {
                    code: self.code,
                    message: self.message,
                    details: self.details,
                },
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Collapses the component error taxonomy onto the ten wire codes. Store
/// errors, config errors, and anything else opaque are logged with their
/// real cause before the caller only ever sees `Internal`.
impl From<NebulaError> for ApiError {
    fn from(err: NebulaError) -> Self {
        match err {
            NebulaError::Taxonomy(TaxonomyError::Required { label }) => {
                ApiError::invalid_input(format!("{label} is required"))
            }
            NebulaError::Taxonomy(TaxonomyError::Unknown { label, name }) => {
                ApiError::invalid_input(format!("unknown {label}: '{name}'"))
            }
            NebulaError::Taxonomy(TaxonomyError::BuiltinImmutable { label, name }) => {
                ApiError::invalid_input(format!("{label} '{name}' is builtin and immutable"))
            }

            NebulaError::Scope(ScopeError::Forbidden) => {
                ApiError::forbidden("not permitted for the caller's scopes")
            }
            NebulaError::Scope(ScopeError::NotFound) => ApiError::not_found("record"),
            NebulaError::Scope(ScopeError::JobNotOwned { job_id }) => {
                tracing::debug!(job_id, "job ownership check failed");
                ApiError::forbidden("not permitted for the caller's scopes")
            }

            NebulaError::Auth(AuthError::MissingCredential) => ApiError::missing_auth(),
            NebulaError::Auth(AuthError::InvalidCredential)
            | NebulaError::Auth(AuthError::Revoked)
            | NebulaError::Auth(AuthError::Expired) => ApiError::invalid_auth(),
            NebulaError::Auth(AuthError::EnrollmentRequired) => {
                ApiError::from_code(ErrorCode::EnrollmentRequired)
            }

            NebulaError::Approval(ApprovalError::PendingCapExceeded { limit }) => {
                ApiError::new(ErrorCode::RateLimited, format!("too many pending approvals (limit {limit})"))
            }
            NebulaError::Approval(ApprovalError::AlreadyProcessed)
            | NebulaError::Approval(ApprovalError::AlreadyRedeemed) => {
                ApiError::conflict("already processed")
            }
            NebulaError::Approval(ApprovalError::NoExecutor { action }) => {
                ApiError::invalid_input(format!("no executor registered for '{action}'"))
            }
            NebulaError::Approval(ApprovalError::NotFound)
            | NebulaError::Approval(ApprovalError::EnrollmentNotFound) => {
                ApiError::not_found("approval request")
            }
            NebulaError::Approval(ApprovalError::GrantsNotApplicable) => {
                ApiError::invalid_input("grants only apply to register_agent approvals")
            }
            NebulaError::Approval(ApprovalError::EnrollmentExpired) => {
                ApiError::new(ErrorCode::Conflict, "enrollment session expired")
            }

            NebulaError::Executor(ExecutorError::Invalid { reason }) => {
                ApiError::invalid_input(reason)
            }
            NebulaError::Executor(ExecutorError::Conflict { kind, reason }) => {
                ApiError::conflict(format!("{kind}: {reason}"))
            }
            NebulaError::Executor(ExecutorError::NotFound { kind, .. }) => {
                ApiError::not_found(&kind)
            }
            NebulaError::Executor(ExecutorError::RevertMismatch) => {
                ApiError::conflict("audit row does not match the entity's current state")
            }

            NebulaError::RateLimited { reason } => {
                tracing::debug!(reason, "rate limited by a lower layer");
                ApiError::rate_limited(None)
            }

            NebulaError::Store(store_err) => {
                if let StoreError::NotFound { kind, .. } | StoreError::NotFoundByKey { kind, .. } =
                    &store_err
                {
                    return ApiError::not_found(kind);
                }
                if let StoreError::UniqueViolation { constraint } = &store_err {
                    return ApiError::conflict(format!("violates {constraint}"));
                }
                tracing::error!(error = %store_err, "store error");
                ApiError::internal("a storage operation failed")
            }

            NebulaError::Config(ConfigError::MissingRequired { field }) => {
                tracing::error!(field, "missing required config");
                ApiError::internal("server misconfigured")
            }
            NebulaError::Config(ConfigError::InvalidValue { field, value, reason }) => {
                tracing::error!(field, value, reason, "invalid config value");
                ApiError::internal("server misconfigured")
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("invalid JSON: {err}"))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(ErrorCode::MissingAuth.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ErrorCode::ApprovalRequired.status_code(), StatusCode::ACCEPTED);
        assert_eq!(ErrorCode::Internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn scope_forbidden_never_becomes_internal() {
        let err: ApiError = NebulaError::Scope(ScopeError::Forbidden).into();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }

    #[test]
    fn store_not_found_surfaces_record_kind_only() {
        let err: ApiError = NebulaError::Store(StoreError::NotFound {
            kind: "entity",
            id: "11111111-1111-1111-1111-111111111111".parse().unwrap(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(!err.message.contains("1111"));
    }

    #[test]
    fn pending_cap_exceeded_is_rate_limited() {
        let err: ApiError = NebulaError::Approval(ApprovalError::PendingCapExceeded { limit: 50 }).into();
        assert_eq!(err.code, ErrorCode::RateLimited);
    }

    #[test]
    fn serializes_screaming_snake_case() {
        let err = ApiError::forbidden("nope");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"FORBIDDEN\""));
    }
}
