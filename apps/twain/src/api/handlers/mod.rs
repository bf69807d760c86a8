//! # API Endpoint Handlers
//!
//! Grouped by audience: the public site, accounts, the member dashboard,
//! payments and the staff back-office.

pub mod accounts;
pub mod admin;
pub mod dashboard;
pub mod payments;
pub mod public;

use super::error::ApiError;
use axum::{Json, http::StatusCode};

/// `201 Created` with the stored record.
type Created<T> = (StatusCode, Json<T>);

fn created<T>(value: T) -> Result<Created<T>, ApiError> {
    Ok((StatusCode::CREATED, Json(value)))
}
