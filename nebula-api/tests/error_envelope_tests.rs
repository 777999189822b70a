//! Wire-level checks for the error envelope that don't need a database:
//! every `ApiError` serializes to the documented
//! `{"detail": {"error": {"code", "message", "details"?}}}` shape and maps
//! to the right HTTP status, independent of which component raised it.

use axum::response::IntoResponse;
use nebula_api::{ApiError, ErrorCode};

async fn envelope(err: ApiError) -> (axum::http::StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn not_found_envelope_matches_documented_shape() {
    let (status, body) = envelope(ApiError::not_found("entity")).await;
    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(body["detail"]["error"]["code"], "NOT_FOUND");
    assert!(body["detail"]["error"]["message"].is_string());
}

#[tokio::test]
async fn forbidden_envelope_uses_forbidden_code() {
    let (status, body) = envelope(ApiError::forbidden("out of scope")).await;
    assert_eq!(status, axum::http::StatusCode::FORBIDDEN);
    assert_eq!(body["detail"]["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn enrollment_required_carries_next_steps_detail() {
    let (status, body) = envelope(ApiError::enrollment_required()).await;
    assert_eq!(status, axum::http::StatusCode::FORBIDDEN);
    assert_eq!(body["detail"]["error"]["code"], "ENROLLMENT_REQUIRED");
    let steps = body["detail"]["error"]["details"]["next_steps"]
        .as_array()
        .expect("next_steps array present");
    assert!(steps.iter().any(|s| s == "agent_enroll_start"));
}

#[tokio::test]
async fn rate_limited_envelope_reports_retry_seconds_in_message() {
    let (status, body) = envelope(ApiError::rate_limited(Some(60))).await;
    assert_eq!(status, axum::http::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["detail"]["error"]["code"], "RATE_LIMITED");
    assert!(body["detail"]["error"]["message"]
        .as_str()
        .unwrap()
        .contains("60s"));
}

#[tokio::test]
async fn approval_required_maps_to_202() {
    let (status, _) = envelope(ApiError::from_code(ErrorCode::ApprovalRequired)).await;
    assert_eq!(status, axum::http::StatusCode::ACCEPTED);
}

#[test]
fn every_error_code_round_trips_through_serde() {
    for code in [
        ErrorCode::MissingAuth,
        ErrorCode::InvalidAuth,
        ErrorCode::Forbidden,
        ErrorCode::NotFound,
        ErrorCode::InvalidInput,
        ErrorCode::Conflict,
        ErrorCode::RateLimited,
        ErrorCode::EnrollmentRequired,
        ErrorCode::ApprovalRequired,
        ErrorCode::Internal,
    ] {
        let json = serde_json::to_string(&code).unwrap();
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
