//! # API Errors
//!
//! Every handler returns `Result<_, ApiError>`. Errors render as
//! `{"success": false, "error": "<message>"}` with a matching status code.

use crate::mpesa::GatewayError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use twain_core::TwainError;

use super::types::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] TwainError),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Staff access required")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("Payments are not configured")]
    PaymentsDisabled,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(err) => match err {
                TwainError::Validation(_) => StatusCode::BAD_REQUEST,
                TwainError::NotFound { .. } => StatusCode::NOT_FOUND,
                TwainError::Conflict(_) => StatusCode::CONFLICT,
                TwainError::Unauthorized => StatusCode::UNAUTHORIZED,
                TwainError::Payment(_) => StatusCode::BAD_GATEWAY,
                TwainError::Storage(_) | TwainError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PaymentsDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(event = "internal_error", error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            if let Self::Gateway(err) = &self {
                tracing::warn!(event = "gateway_error", error = %err, "M-Pesa call failed");
            }
            self.to_string()
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_http() {
        let cases = [
            (TwainError::validation("bad"), StatusCode::BAD_REQUEST),
            (TwainError::not_found("tool", 1), StatusCode::NOT_FOUND),
            (TwainError::Conflict("dup".into()), StatusCode::CONFLICT),
            (TwainError::Unauthorized, StatusCode::UNAUTHORIZED),
            (TwainError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn payment_errors_map_to_gateway_codes() {
        assert_eq!(ApiError::PaymentsDisabled.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::from(GatewayError::Unauthorized).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn validation_message_passes_through() {
        let err = ApiError::from(TwainError::validation("Passwords do not match"));
        assert_eq!(err.to_string(), "Passwords do not match");
    }
}
