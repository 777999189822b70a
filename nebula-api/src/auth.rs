//! Axum extractor for the authenticated [`Caller`] a prior `auth_middleware`
//! pass resolved and stored in request extensions.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use nebula_core::Caller;

use crate::error::ApiError;
use crate::state::AppState;

/// Pulls the [`Caller`] `middleware::auth_middleware` stashed in request
/// extensions. Any handler that takes this as a parameter implicitly
/// requires the route to be layered with that middleware — if it isn't,
/// extraction fails with `MissingAuth` rather than panicking, since a
/// caller hitting a misrouted path shouldn't see a 500.
pub struct AuthenticatedCaller(pub Caller);

impl FromRequestParts<AppState> for AuthenticatedCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .map(AuthenticatedCaller)
            .ok_or_else(ApiError::missing_auth)
    }
}

/// Requires the caller to be a [`Caller::User`] — the reviewer-only surface
/// (approvals, enrollment review) nothing else may touch.
pub struct ReviewerCaller(pub nebula_core::UserId);

impl FromRequestParts<AppState> for ReviewerCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthenticatedCaller(caller) = AuthenticatedCaller::from_request_parts(parts, state).await?;
        match caller {
            Caller::User { user_id, .. } => Ok(ReviewerCaller(user_id)),
            _ => Err(ApiError::forbidden("this action requires a human reviewer")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn reviewer_caller_rejects_agents() {
        let agent = Caller::Agent {
            agent_id: nebula_core::NebulaAgentId::new_v4(),
            trusted: true,
            owner_scope_names: HashSet::new(),
            effective_scope_names: HashSet::new(),
            capabilities: HashSet::new(),
        };
        assert!(!matches!(agent, Caller::User { .. }));
    }
}
