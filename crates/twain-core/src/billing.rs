//! # Billing
//!
//! Subscription plans, per-user subscriptions and M-Pesa payment attempts.
//!
//! ## Subscription lifecycle
//!
//! ```text
//!   Inactive ──activate──▶ Active ──cancel──▶ Canceled
//!                            ▲                   │
//!                            └─────reinstate─────┘
//! ```
//!
//! `activate` is driven by a successful payment callback; `cancel` and
//! `reinstate` are admin actions. `PastDue` is reserved for renewals that
//! lapse and is only set by hand.

use crate::primitives::{
    MAX_PLAN_BADGE_LENGTH, MAX_PLAN_NAME_LENGTH, MAX_PLAN_SLUG_LENGTH, MAX_STK_AMOUNT_KES,
    MAX_TEXT_LENGTH, MIN_STK_AMOUNT_KES, PHONE_LENGTH, PHONE_PREFIX,
};
use crate::validate::{max_length, required, slug};
use crate::{Timestamp, TwainError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// =============================================================================
// PLANS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Monthly,
    OneTime,
}

impl PlanType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Monthly => "Monthly Subscription",
            Self::OneTime => "One-Time Setup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub plan_type: PlanType,
    pub price_kes: u64,
    pub description: String,
    /// Comma-separated list of features.
    pub features: String,
    /// Optional badge like "Most Popular".
    pub badge: String,
    /// Visually emphasize this plan.
    pub highlighted: bool,
    pub is_active: bool,
    pub sort_order: u32,
}

impl SubscriptionPlan {
    pub fn validate(&self) -> Result<(), TwainError> {
        required("Name", &self.name, MAX_PLAN_NAME_LENGTH)?;
        slug("Slug", &self.slug, MAX_PLAN_SLUG_LENGTH)?;
        max_length("Description", &self.description, MAX_TEXT_LENGTH)?;
        max_length("Features", &self.features, MAX_TEXT_LENGTH)?;
        max_length("Badge", &self.badge, MAX_PLAN_BADGE_LENGTH)
    }

    /// Features as a list, trimmed, empties dropped.
    pub fn feature_list(&self) -> Vec<String> {
        self.features
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Display order: `sort_order`, then cheapest first.
    pub fn display_order(a: &Self, b: &Self) -> Ordering {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.price_kes.cmp(&b.price_kes))
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
    PastDue,
    Canceled,
}

/// A user's (single) subscription row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: u64,
    pub user_id: u64,
    pub plan_id: Option<u64>,
    pub status: SubscriptionStatus,
    pub started_at: Option<Timestamp>,
    pub renewed_at: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
}

impl UserSubscription {
    /// A fresh inactive subscription for `user_id`.
    pub fn inactive(user_id: u64) -> Self {
        Self {
            id: 0,
            user_id,
            plan_id: None,
            status: SubscriptionStatus::Inactive,
            started_at: None,
            renewed_at: None,
            canceled_at: None,
        }
    }

    /// Activate on a successful payment for `plan`.
    pub fn activate(&mut self, plan: &SubscriptionPlan, now: Timestamp) {
        self.plan_id = Some(plan.id);
        self.status = SubscriptionStatus::Active;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.renewed_at = Some(now);
    }

    /// Cancel by hand.
    pub fn cancel(&mut self, now: Timestamp) {
        self.status = SubscriptionStatus::Canceled;
        self.canceled_at = Some(now);
    }

    /// Mark active again without a payment (admin action).
    pub fn reinstate(&mut self, now: Timestamp) {
        self.status = SubscriptionStatus::Active;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }
}

// =============================================================================
// PAYMENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

/// One STK Push attempt and its eventual outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: u64,
    pub user_id: u64,
    /// Plan the user chose, when the push came from the subscription page.
    pub plan_id: Option<u64>,
    pub amount_kes: u64,
    pub phone_number: String,
    /// M-Pesa receipt number, set on success.
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub created_at: Timestamp,
    pub checkout_request_id: Option<String>,
    pub merchant_request_id: Option<String>,
    pub result_desc: Option<String>,
    pub updated_at: Option<Timestamp>,
}

impl Payment {
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }
}

/// Normalize a Safaricom number to `2547XXXXXXXX`.
///
/// Accepts `2547XXXXXXXX`, `+2547XXXXXXXX` and `07XXXXXXXX`; spaces are ignored.
pub fn normalize_phone(raw: &str) -> Result<String, TwainError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let candidate = if let Some(rest) = compact.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = compact.strip_prefix('0') {
        format!("254{rest}")
    } else {
        compact
    };

    if candidate.len() == PHONE_LENGTH
        && candidate.starts_with(PHONE_PREFIX)
        && candidate.chars().all(|c| c.is_ascii_digit())
    {
        Ok(candidate)
    } else {
        Err(TwainError::validation("Enter a valid phone (2547XXXXXXXX)."))
    }
}

/// Check an STK Push amount is within M-Pesa limits.
pub fn validate_amount(amount_kes: u64) -> Result<(), TwainError> {
    if (MIN_STK_AMOUNT_KES..=MAX_STK_AMOUNT_KES).contains(&amount_kes) {
        Ok(())
    } else {
        Err(TwainError::validation(format!(
            "Amount must be between {MIN_STK_AMOUNT_KES} and {MAX_STK_AMOUNT_KES} KES"
        )))
    }
}

// =============================================================================
// TESTS
// =============================================================================
