//! End-to-end smoke test over the assembled router. Builds a real
//! [`AppState`] (lazy connection pool — deadpool never dials out until a
//! connection is actually checked out) so `/health`, which never touches
//! the store, proves the whole middleware stack (rate limiting, auth
//! layering, router merge order) wires together the way `main.rs` expects.
//!
//! Anything that needs a live row (readiness, records, approvals) belongs
//! behind the `db-tests` feature, matching the teacher's own split between
//! fast unit/property tests and database-backed integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use nebula_agents::ExecutorRegistry;
use nebula_api::{AppState, NebulaConfig};
use nebula_approvals::{ApprovalEngine, ApprovalGate, EnrollmentEngine};
use nebula_context::{Authenticator, AuthenticatorConfig, ScopeMediator, ScopeMediatorConfig};
use nebula_storage::{DbConfig, QueryCatalog, RegistryHandle, Store};
use nebula_test_utils::registry::sample_registry;

fn test_state() -> AppState {
    let db = DbConfig {
        host: "127.0.0.1".to_string(),
        port: 5432,
        dbname: "nebula_test".to_string(),
        user: "nebula".to_string(),
        password: "unused".to_string(),
        max_size: 4,
        timeout: Duration::from_secs(1),
    };
    let pool = db.create_pool().expect("pool config is valid, connects lazily");

    let queries = Arc::new(QueryCatalog::new("sql"));
    let (registry, _ids) = sample_registry();
    let registry = Arc::new(RegistryHandle::new(registry));
    let store = Store::new(pool, queries);

    let authenticator = Authenticator::new(
        store.clone(),
        registry.clone(),
        AuthenticatorConfig {
            bootstrap_enabled: true,
            local_insecure: true,
        },
    );
    let scope_mediator = ScopeMediator::new(store.clone(), registry.clone(), ScopeMediatorConfig::default());
    let approval_engine = ApprovalEngine::new(store.clone(), registry.clone());
    let approval_gate = Arc::new(ApprovalGate::new(approval_engine.clone()));
    let enrollment_engine = EnrollmentEngine::new(store.clone(), registry.clone());
    let executors = ExecutorRegistry::new(store.clone(), registry.clone());

    let config = NebulaConfig {
        db,
        admin_bypass_strict: false,
        bootstrap_enabled: true,
        local_insecure: true,
        cors_origins: Vec::new(),
        cors_allow_credentials: false,
        cors_max_age_secs: 86400,
        rate_limit_enabled: false,
        rate_limit_unauthenticated: 60,
        rate_limit_authenticated: 600,
        rate_limit_burst: 10,
        rate_limit_window: Duration::from_secs(60),
    };

    AppState {
        store,
        registry,
        authenticator,
        scope_mediator,
        approval_engine,
        approval_gate,
        enrollment_engine,
        executors,
        config: Arc::new(config),
        rate_limiter: Arc::new(nebula_api::RateLimiter::new(60, 600, 10, false)),
        start_time: std::time::Instant::now(),
    }
}

#[tokio::test]
async fn health_is_reachable_without_auth() {
    let app = nebula_api::create_api_router(test_state());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["status"], "ok");
}

#[tokio::test]
async fn protected_route_without_credential_is_rejected() {
    let mut state = test_state();
    state.authenticator = Authenticator::new(
        state.store.clone(),
        state.registry.clone(),
        AuthenticatorConfig {
            bootstrap_enabled: false,
            local_insecure: true,
        },
    );
    let app = nebula_api::create_api_router(state);

    let response = app
        .oneshot(Request::builder().uri("/entities/00000000-0000-0000-0000-000000000000").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["detail"]["error"]["code"], "MISSING_AUTH");
}

#[tokio::test]
async fn unknown_route_is_a_plain_404() {
    let app = nebula_api::create_api_router(test_state());

    let response = app
        .oneshot(Request::builder().uri("/nonexistent").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
