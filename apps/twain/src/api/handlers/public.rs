//! Unauthenticated marketing-site endpoints.

use super::{Created, created};
use crate::api::AppState;
use crate::api::error::ApiError;
use crate::api::types::{ContactRequest, HealthResponse, MessageResponse, SiteResponse};
use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use twain_core::{CaseStudy, Service, Testimonial};

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Services, testimonials and case studies for the landing page.
pub async fn site_handler(State(state): State<AppState>) -> Result<Json<SiteResponse>, ApiError> {
    Ok(Json(SiteResponse {
        services: state.store.list::<Service>()?,
        testimonials: state.store.list::<Testimonial>()?,
        case_studies: state.store.list::<CaseStudy>()?,
    }))
}

/// Lead capture.
pub async fn contact_handler(
    State(state): State<AppState>,
    Json(request): Json<ContactRequest>,
) -> Result<Created<MessageResponse>, ApiError> {
    let message = state.store.insert(request.into_message(Utc::now()))?;
    tracing::info!(event = "contact_request", message_id = message.id, "New contact request");
    created(MessageResponse::ok(
        "Your request has been submitted successfully!",
    ))
}
