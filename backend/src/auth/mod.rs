//! Request authentication.
//!
//! Two checks: a pre-shared key guarding the whole API, compared in constant time, and the acting
//! user header that mutating per-user routes must match.

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, ErrorResponse};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header naming the user a request acts as.
pub const ACTING_USER_HEADER: &str = "x-wrh-user";

/// PSK authentication layer function that takes the expected PSK as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // No PSK configured: open access (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let headers = request.headers();
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        });

    let rejection = match provided {
        Some(key) if constant_time_compare(key, &expected) => None,
        Some(_) => Some("Invalid API key"),
        None => Some("Missing or invalid API key"),
    };

    match rejection {
        None => next.run(request).await,
        Some(message) => unauthorized_response(message),
    }
}

/// The user id a request acts as, if the header is present.
pub fn acting_user(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ACTING_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Require the request to act as `user_id`.
pub fn require_acting_user(headers: &HeaderMap, user_id: &str) -> Result<(), AppError> {
    match acting_user(headers) {
        None => Err(AppError::Unauthorized(format!(
            "Missing {} header",
            ACTING_USER_HEADER
        ))),
        Some(actor) if actor == user_id => Ok(()),
        Some(actor) => {
            tracing::warn!(actor, user_id, "Rejected write to another user's records");
            Err(AppError::Forbidden(format!(
                "User {} cannot modify records of {}",
                actor, user_id
            )))
        }
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse::new(&AppError::Unauthorized(message.to_string()), 0);
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("test-key-123", "test-key-123"));
        assert!(!constant_time_compare("test-key-123", "test-key-124"));
        assert!(!constant_time_compare("short", "much-longer-key"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_acting_user_must_match() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            require_acting_user(&headers, "u1"),
            Err(AppError::Unauthorized(_))
        ));

        headers.insert(ACTING_USER_HEADER, HeaderValue::from_static("u2"));
        assert!(matches!(
            require_acting_user(&headers, "u1"),
            Err(AppError::Forbidden(_))
        ));

        headers.insert(ACTING_USER_HEADER, HeaderValue::from_static(" u1 "));
        assert!(require_acting_user(&headers, "u1").is_ok());
    }
}
