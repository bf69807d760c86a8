//! Signup, login and logout.

use super::{Created, created};
use crate::api::AppState;
use crate::api::auth::CurrentUser;
use crate::api::error::ApiError;
use crate::api::types::{AccountResponse, AuthResponse, LoginRequest, MessageResponse, SignupRequest};
use axum::{Extension, Json, extract::State};
use chrono::Utc;
use twain_core::{Flash, TwainError, User};

fn start_session(state: &AppState, user: &User, flash: Flash) -> Result<AuthResponse, ApiError> {
    let now = Utc::now();
    let ttl = state.config.session_ttl();
    let token = state.store.open_session(user.id, Some(flash), now, ttl)?;
    Ok(AuthResponse {
        success: true,
        token,
        expires_at: now + ttl,
        user: AccountResponse::from(user),
    })
}

/// Register and log straight in.
pub async fn signup_handler(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<Created<AuthResponse>, ApiError> {
    let user = state.store.create_user(request.into_new_user(), Utc::now())?;
    tracing::info!(event = "signup", user_id = user.id, "New account");
    created(start_session(&state, &user, Flash::NewSignup)?)
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Some(user) = state
        .store
        .authenticate(request.username.trim(), &request.password)?
    else {
        tracing::warn!(event = "auth_failure", reason = "bad_credentials", "Login failed");
        return Err(TwainError::Unauthorized.into());
    };
    Ok(Json(start_session(&state, &user, Flash::JustLoggedIn)?))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.close_session(&current.token)?;
    Ok(Json(MessageResponse::ok("You have been logged out.")))
}

/// The caller's profile. Also served as `/dashboard/settings`.
pub async fn me_handler(Extension(current): Extension<CurrentUser>) -> Json<AccountResponse> {
    Json(AccountResponse::from(&current.user))
}
