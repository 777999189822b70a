//! Nebula API - HTTP surface for the agent-context control plane.
//!
//! This crate wires the `nebula-core`/`nebula-storage`/`nebula-context`/
//! `nebula-approvals`/`nebula-agents` building blocks into a single Axum
//! router: authentication, rate limiting, scope mediation, approval gating,
//! and executor dispatch, behind one REST surface plus an MCP-style
//! tool-call endpoint.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod openapi;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod validation;

pub use config::NebulaConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, caller_from_request, rate_limit_middleware, MiddlewareError};
pub use openapi::ApiDoc;
pub use rate_limit::RateLimiter;
pub use routes::create_api_router;
pub use state::AppState;
