//! Nebula API Server Entry Point
//!
//! Bootstraps configuration, the storage pool, the enum registry snapshot,
//! and every component service, then serves the Axum router built by
//! [`nebula_api::create_api_router`].

use std::net::SocketAddr;
use std::sync::Arc;

use nebula_agents::ExecutorRegistry;
use nebula_approvals::{ApprovalEngine, ApprovalGate, EnrollmentEngine};
use nebula_context::{Authenticator, AuthenticatorConfig, ScopeMediator, ScopeMediatorConfig};
use nebula_storage::{load_enum_registry, QueryCatalog, RegistryHandle, Store};

use nebula_api::{ApiResult, NebulaConfig, RateLimiter};

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,nebula_api=debug")),
        )
        .init();

    let config = NebulaConfig::from_env().map_err(|e| {
        nebula_api::ApiError::internal(format!("invalid configuration: {e}"))
    })?;

    let pool = config.db.create_pool()?;

    let sql_root =
        std::env::var("NEBULA_SQL_DIR").unwrap_or_else(|_| "nebula-storage/sql".to_string());
    let queries = Arc::new(QueryCatalog::new(sql_root));

    let registry = {
        let client = pool.get().await.map_err(|e| {
            nebula_api::ApiError::internal(format!("could not reach database: {e}"))
        })?;
        load_enum_registry(&client, &queries).await?
    };
    let registry = Arc::new(RegistryHandle::new(registry));

    let store = Store::new(pool, queries);

    let authenticator = Authenticator::new(
        store.clone(),
        registry.clone(),
        AuthenticatorConfig {
            bootstrap_enabled: config.bootstrap_enabled,
            local_insecure: config.local_insecure,
        },
    );

    let scope_mediator = ScopeMediator::new(
        store.clone(),
        registry.clone(),
        ScopeMediatorConfig {
            strict_admin: config.admin_bypass_strict,
            ..ScopeMediatorConfig::default()
        },
    );

    let approval_engine = ApprovalEngine::new(store.clone(), registry.clone());
    let approval_gate = Arc::new(ApprovalGate::new(approval_engine.clone()));
    let enrollment_engine = EnrollmentEngine::new(store.clone(), registry.clone());
    let executors = ExecutorRegistry::new(store.clone(), registry.clone());

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_unauthenticated,
        config.rate_limit_authenticated,
        config.rate_limit_burst,
        config.rate_limit_enabled,
    ));

    let state = nebula_api::AppState {
        store,
        registry,
        authenticator,
        scope_mediator,
        approval_engine,
        approval_gate,
        enrollment_engine,
        executors,
        config: Arc::new(config),
        rate_limiter,
        start_time: std::time::Instant::now(),
    };

    let port: u16 = std::env::var("NEBULA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let app = nebula_api::create_api_router(state);

    tracing::info!(%addr, "nebula-api listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| nebula_api::ApiError::internal(format!("failed to bind {addr}: {e}")))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| nebula_api::ApiError::internal(format!("server error: {e}")))?;

    Ok(())
}
