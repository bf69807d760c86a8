//! # Payment Endpoints
//!
//! STK Push initiation (member routes) and the Daraja result webhook.
//!
//! The webhook acknowledges every well-formed JSON payload with
//! `{"ResultCode":0,"ResultDesc":"Accepted"}` whether or not it matched a
//! payment, so Safaricom never retries a callback we have already seen.

use crate::api::AppState;
use crate::api::auth::{CurrentUser, constant_time_eq};
use crate::api::error::ApiError;
use crate::api::types::{CallbackQuery, PayPlanRequest, StkPushBody, StkPushResult};
use crate::mpesa::StkGateway;
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use chrono::Utc;
use std::sync::Arc;
use twain_core::mpesa::{CallbackAck, CallbackEnvelope};
use twain_core::{
    Payment, PendingPayment, Reconciliation, SubscriptionPlan, TwainError, normalize_phone,
    validate_amount,
};

const DEFAULT_ACCOUNT_REFERENCE: &str = "Twain";

fn gateway(state: &AppState) -> Result<Arc<dyn StkGateway>, ApiError> {
    state.gateway.clone().ok_or(ApiError::PaymentsDisabled)
}

fn account_reference(state: &AppState) -> String {
    state
        .config
        .mpesa
        .account_reference
        .clone()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_ACCOUNT_REFERENCE.to_string())
}

/// Push, then record the pending payment under the returned checkout id.
async fn push_and_record(
    state: &AppState,
    user_id: u64,
    plan_id: Option<u64>,
    raw_phone: &str,
    amount_kes: u64,
    description: &str,
) -> Result<Payment, ApiError> {
    let gateway = gateway(state)?;
    let phone = normalize_phone(raw_phone)?;
    validate_amount(amount_kes)?;

    let response = gateway
        .stk_push(&phone, amount_kes, &account_reference(state), description)
        .await?;

    let checkout_request_id = response.checkout_request_id.clone();
    let payment = state
        .store
        .record_pending_payment(
            PendingPayment {
                user_id,
                plan_id,
                amount_kes,
                phone_number: phone,
                checkout_request_id: response.checkout_request_id,
                merchant_request_id: response.merchant_request_id,
            },
            Utc::now(),
        )
        .inspect_err(|e| {
            tracing::error!(
                event = "stk_push_unrecorded",
                checkout_request_id = %checkout_request_id,
                user_id,
                amount_kes,
                error = %e,
                "STK push sent but the pending payment was not stored"
            );
        })?;
    tracing::info!(
        event = "stk_push",
        payment_id = payment.id,
        user_id,
        amount_kes,
        "STK push sent"
    );
    Ok(payment)
}

/// Pay for a plan at its listed price.
pub async fn pay_plan_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(plan_id): Path<u64>,
    Json(request): Json<PayPlanRequest>,
) -> Result<Json<StkPushResult>, ApiError> {
    gateway(&state)?;
    let plan = state
        .store
        .get::<SubscriptionPlan>(plan_id)?
        .filter(|p| p.is_active)
        .ok_or_else(|| TwainError::not_found("plan", plan_id))?;

    let payment = push_and_record(
        &state,
        current.user.id,
        Some(plan.id),
        &request.phone_number,
        plan.price_kes,
        &plan.name,
    )
    .await?;
    Ok(Json(StkPushResult {
        success: true,
        message: format!(
            "Check your phone to complete the KES {} payment for {}.",
            plan.price_kes, plan.name
        ),
        payment,
    }))
}

/// An ad-hoc push with no plan attached.
pub async fn stk_push_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<StkPushBody>,
) -> Result<Json<StkPushResult>, ApiError> {
    let payment = push_and_record(
        &state,
        current.user.id,
        None,
        &request.phone,
        request.amount,
        "Payment",
    )
    .await?;
    Ok(Json(StkPushResult {
        success: true,
        message: "STK push sent. Check your phone to complete the payment.".to_string(),
        payment,
    }))
}

fn warn_on_amount_mismatch(payment: &Payment, paid_kes: Option<u64>) {
    match paid_kes {
        Some(paid) if paid != payment.amount_kes => tracing::warn!(
            event = "payment_amount_mismatch",
            payment_id = payment.id,
            expected_kes = payment.amount_kes,
            paid_kes = paid,
            "Callback amount differs from the pushed amount"
        ),
        _ => {}
    }
}

/// Daraja result webhook.
pub async fn callback_handler(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Result<Json<CallbackAck>, ApiError> {
    if let Some(expected) = state.config.callback_token() {
        let provided = query.token.as_deref().unwrap_or_default();
        if !constant_time_eq(provided, expected) {
            tracing::warn!(
                event = "auth_failure",
                reason = "bad_callback_token",
                "Payment callback with wrong token"
            );
            return Err(ApiError::Unauthenticated);
        }
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON".to_string()))?;

    let envelope = match serde_json::from_value::<CallbackEnvelope>(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(event = "payment_callback", outcome = "malformed", error = %e, "Ignoring callback");
            return Ok(Json(CallbackAck::accepted()));
        }
    };

    let callback = envelope.body.stk_callback;
    let outcome = state.store.reconcile_callback(&callback, Utc::now())?;
    if let Reconciliation::Activated { payment, .. } | Reconciliation::PaidWithoutPlan { payment } =
        &outcome
    {
        warn_on_amount_mismatch(payment, callback.amount());
    }
    match &outcome {
        Reconciliation::Activated { payment, subscription } => tracing::info!(
            event = "payment_callback",
            outcome = outcome.label(),
            payment_id = payment.id,
            subscription_id = subscription.id,
            "Subscription activated"
        ),
        Reconciliation::Unmatched => tracing::error!(
            event = "payment_callback",
            outcome = outcome.label(),
            checkout_request_id = %callback.checkout_request_id,
            result_code = callback.result_code,
            receipt = ?callback.receipt_number(),
            "Callback for unknown checkout request; needs manual reconciliation"
        ),
        Reconciliation::Duplicate { payment }
        | Reconciliation::PaidWithoutPlan { payment }
        | Reconciliation::Failed { payment } => tracing::info!(
            event = "payment_callback",
            outcome = outcome.label(),
            payment_id = payment.id,
            result_code = callback.result_code,
            "Callback processed"
        ),
    }
    Ok(Json(CallbackAck::accepted()))
}

