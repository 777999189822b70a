//! Error types for Nebula core operations.

use thiserror::Error;

/// Errors raised while resolving or applying taxonomy (enum registry) names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("{label} required")]
    Required { label: &'static str },

    #[error("Unknown {label}: {name}")]
    Unknown { label: &'static str, name: String },

    #[error("Cannot rename built-in {label} '{name}'")]
    BuiltinImmutable { label: &'static str, name: String },
}

/// Errors raised by the scope mediator (C4).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("record not visible to caller")]
    Forbidden,

    #[error("record not found")]
    NotFound,

    #[error("agent does not own job {job_id}")]
    JobNotOwned { job_id: String },
}

/// Errors raised by the authenticator (C3).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer credential")]
    MissingCredential,

    #[error("credential malformed or unknown")]
    InvalidCredential,

    #[error("credential revoked")]
    Revoked,

    #[error("credential expired")]
    Expired,

    #[error("bootstrap caller must enroll before calling this tool")]
    EnrollmentRequired,
}

/// Errors raised by the approval engine (C5) and bootstrap enrollment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("approval request already processed")]
    AlreadyProcessed,

    #[error("no executor registered for action '{action}'")]
    NoExecutor { action: String },

    #[error("agent has too many pending approval requests (limit {limit})")]
    PendingCapExceeded { limit: u32 },

    #[error("approval request not found")]
    NotFound,

    #[error("reviewer grant fields only apply to register_agent proposals")]
    GrantsNotApplicable,

    #[error("enrollment session expired")]
    EnrollmentExpired,

    #[error("enrollment token already redeemed")]
    AlreadyRedeemed,

    #[error("enrollment session or token not recognized")]
    EnrollmentNotFound,
}

/// Errors raised by action executors (C6).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("validation failed: {reason}")]
    Invalid { reason: String },

    #[error("{kind} already exists: {reason}")]
    Conflict { kind: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("revert source row is not for this record")]
    RevertMismatch,
}

/// Store-layer errors (connection, query, transaction failures).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("record not found: {kind} {id}")]
    NotFound { kind: &'static str, id: uuid::Uuid },

    /// Same as `NotFound`, for the one record kind (jobs) keyed by a
    /// human-readable string id instead of a uuid.
    #[error("record not found: {kind} {key}")]
    NotFoundByKey { kind: &'static str, key: String },

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("pool exhausted or unavailable: {reason}")]
    PoolUnavailable { reason: String },

    #[error("query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("transaction failed: {reason}")]
    TransactionFailed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration field: {field}")]
    MissingRequired { field: &'static str },

    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Master error type for all Nebula core operations.
#[derive(Debug, Clone, Error)]
pub enum NebulaError {
    #[error("taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("scope error: {0}")]
    Scope(#[from] ScopeError),

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("approval error: {0}")]
    Approval(#[from] ApprovalError),

    #[error("executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("rate limited: {reason}")]
    RateLimited { reason: String },
}

/// Result type alias for Nebula core operations.
pub type NebulaResult<T> = Result<T, NebulaError>;
