//! Axum middleware: bearer authentication (wraps [`nebula_context::Authenticator`]
//! and injects a [`Caller`] into request extensions) and per-caller rate
//! limiting. Grounded on the teacher's `auth_middleware`/`rate_limit_middleware`
//! shape (`middleware::from_fn_with_state`, extensions-based context
//! passing) adapted to Nebula's bearer-only credential model.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use nebula_core::Caller;

use crate::error::ApiError;
use crate::state::AppState;

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Resolves the bearer credential (if any) to a [`Caller`] and stores it in
/// request extensions. Routes that require auth pull it back out via the
/// `Caller` extractor in `auth.rs`; routes that don't (health, login,
/// register) simply never look.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request);
    let caller = state.authenticator.authenticate(token).await?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Per-caller rate limiting (spec.md's `RATE_LIMITED` response). Keys on the
/// bearer token's 8-char prefix when present (same prefix the authenticator
/// uses for lookup), falling back to the connecting peer address.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request);
    let (key, authenticated) = match token {
        Some(t) if t.len() >= crate::constants::API_KEY_PREFIX_LEN => {
            (t[..crate::constants::API_KEY_PREFIX_LEN].to_string(), true)
        }
        _ => {
            let addr = request
                .extensions()
                .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
                .map(|c| c.0.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            (addr, false)
        }
    };

    if !state.rate_limiter.check(&key, authenticated) {
        return Err(ApiError::rate_limited(Some(60)));
    }

    Ok(next.run(request).await)
}

/// Extracts the [`Caller`] a prior `auth_middleware` pass stored in request
/// extensions. Panics only if routed to without the middleware layered —
/// a wiring bug, not a runtime condition.
pub fn caller_from_request(request: &Request) -> &Caller {
    request
        .extensions()
        .get::<Caller>()
        .expect("Caller missing from request extensions — is auth_middleware layered?")
}

#[derive(Debug)]
pub struct MiddlewareError(pub ApiError);

impl IntoResponse for MiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

impl From<ApiError> for MiddlewareError {
    fn from(err: ApiError) -> Self {
        MiddlewareError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_auth(header_value: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/entities");
        if let Some(value) = header_value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn bearer_token_strips_prefix() {
        let request = request_with_auth(Some("Bearer nbl_abc123"));
        assert_eq!(bearer_token(&request), Some("nbl_abc123"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        let request = request_with_auth(Some("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&request), None);
    }

    #[test]
    fn bearer_token_absent_without_header() {
        let request = request_with_auth(None);
        assert_eq!(bearer_token(&request), None);
    }

    #[test]
    #[should_panic(expected = "Caller missing")]
    fn caller_from_request_panics_without_middleware() {
        let request = request_with_auth(None);
        let _ = caller_from_request(&request);
    }
}

