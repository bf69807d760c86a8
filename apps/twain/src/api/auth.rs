//! # Authentication Module
//!
//! Session-token authentication for member and staff routes.
//!
//! Signup and login hand out an opaque token; clients send it back as
//! ```text
//! Authorization: Bearer <token>
//! ```
//! The guards resolve it against the session table and stash the
//! [`CurrentUser`] in request extensions for handlers to pick up.

use super::AppState;
use super::error::ApiError;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use subtle::ConstantTimeEq;
use twain_core::User;

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

/// Token from `Authorization: Bearer <token>` (a raw token is accepted too).
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

/// Compare secrets without leaking where they differ or how long they are.
pub fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, ApiError> {
    let Some(token) = bearer_token(headers) else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            "Missing Authorization header"
        );
        return Err(ApiError::Unauthenticated);
    };

    match state.store.resolve_session(token, Utc::now())? {
        Some((_, user)) => Ok(CurrentUser {
            user,
            token: token.to_string(),
        }),
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_session",
                "Unknown or expired session token"
            );
            Err(ApiError::Unauthenticated)
        }
    }
}

/// Any logged-in user.
pub async fn require_login(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let current = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

/// Logged-in staff only.
pub async fn require_staff(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let current = authenticate(&state, request.headers())?;
    if !current.user.is_staff {
        tracing::warn!(
            event = "auth_failure",
            reason = "not_staff",
            user_id = current.user.id,
            "Non-staff user attempted an admin route"
        );
        return Err(ApiError::Forbidden);
    }
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_prefix_is_optional() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn secrets_compare_exactly() {
        assert!(constant_time_eq("hush", "hush"));
        assert!(!constant_time_eq("hush", "hus"));
        assert!(!constant_time_eq("hush", "hushh"));
        assert!(!constant_time_eq("", "hush"));
    }
}
