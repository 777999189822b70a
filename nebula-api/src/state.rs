//! Shared application state for Axum routers — one handle per component,
//! all cheap to clone (every field is itself `Arc`/pool-backed).

use std::sync::Arc;

use nebula_agents::ExecutorRegistry;
use nebula_approvals::{ApprovalEngine, ApprovalGate, EnrollmentEngine};
use nebula_context::{Authenticator, ScopeMediator};
use nebula_storage::{RegistryHandle, Store};

use crate::config::NebulaConfig;
use crate::rate_limit::RateLimiter;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub registry: Arc<RegistryHandle>,
    pub authenticator: Authenticator,
    pub scope_mediator: ScopeMediator,
    pub approval_engine: ApprovalEngine,
    pub approval_gate: Arc<ApprovalGate>,
    pub enrollment_engine: EnrollmentEngine,
    pub executors: ExecutorRegistry,
    pub config: Arc<NebulaConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub start_time: std::time::Instant,
}

crate::impl_from_ref!(Store, store);
crate::impl_from_ref!(Arc<RegistryHandle>, registry);
crate::impl_from_ref!(Authenticator, authenticator);
crate::impl_from_ref!(ScopeMediator, scope_mediator);
crate::impl_from_ref!(ApprovalEngine, approval_engine);
crate::impl_from_ref!(Arc<ApprovalGate>, approval_gate);
crate::impl_from_ref!(EnrollmentEngine, enrollment_engine);
crate::impl_from_ref!(ExecutorRegistry, executors);
crate::impl_from_ref!(Arc<NebulaConfig>, config);
crate::impl_from_ref!(Arc<RateLimiter>, rate_limiter);
crate::impl_from_ref!(std::time::Instant, start_time);
