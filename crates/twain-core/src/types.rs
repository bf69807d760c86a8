//! # Core Type Definitions
//!
//! Shared building blocks for every Twain record:
//! - `Timestamp`, the UTC instant type used for all audit columns
//! - `TwainError`, the single error type returned by the model and store
//!
//! All record identifiers are plain `u64` values allocated by the store,
//! starting at 1.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// UTC instant used for every created/updated/started column.
pub type Timestamp = DateTime<Utc>;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Twain model and store.
///
/// - No silent failures
/// - Use `Result<T, TwainError>` for fallible operations
/// - The store never panics; all errors are recoverable
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TwainError {
    /// Input failed validation; the message is safe to show to the user.
    #[error("{0}")]
    Validation(String),

    /// The requested record does not exist.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// A unique constraint would be violated; the message is user-facing.
    #[error("{0}")]
    Conflict(String),

    /// A username/password pair was rejected.
    #[error("Invalid username or password")]
    Unauthorized,

    /// The underlying database failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The payment flow could not proceed.
    #[error("Payment error: {0}")]
    Payment(String),
}

impl TwainError {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a missing record keyed by id.
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        Self::NotFound {
            kind,
            key: id.to_string(),
        }
    }
}

/// Map any database error into `TwainError::Storage`.
pub(crate) fn storage_err<E: std::fmt::Display>(e: E) -> TwainError {
    TwainError::Storage(e.to_string())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_displayed_verbatim() {
        let err = TwainError::validation("Passwords do not match");
        assert_eq!(err.to_string(), "Passwords do not match");
    }

    #[test]
    fn not_found_names_kind_and_key() {
        let err = TwainError::not_found("tool", 7);
        assert_eq!(err.to_string(), "tool not found: 7");
    }
}
