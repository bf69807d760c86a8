//! # Payment Reconciliation
//!
//! Matches asynchronous STK callbacks to the pending payments that started
//! them and activates subscriptions on success.
//!
//! ## Flow
//!
//! ```text
//!   record_pending_payment ──▶ Payment{Pending} + checkout index entry
//!                                         │
//!   reconcile_callback(CheckoutRequestID) ┘
//!        ├─ no index entry        → Unmatched
//!        ├─ payment not Pending   → Duplicate        (nothing written)
//!        ├─ ResultCode != 0       → Failed
//!        └─ ResultCode == 0       → Success, then
//!              ├─ plan found      → Activated        (subscription upserted)
//!              └─ no plan         → PaidWithoutPlan
//! ```
//!
//! The plan is the first one (by id) priced at the paid amount. Only when no
//! plan carries that price does the plan the payment was started for apply.
//!
//! Everything for one callback happens in a single write transaction, so a
//! replayed callback can never double-activate.

use crate::mpesa::StkCallback;
use crate::storage::Store;
use crate::storage::{load, load_all, put};
use crate::storage::{CHECKOUT_INDEX, insert_in};
use crate::types::storage_err;
use crate::{
    Payment, PaymentStatus, SubscriptionPlan, Timestamp, TwainError, UserSubscription,
};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};

/// A successful STK push, ready to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub user_id: u64,
    pub plan_id: Option<u64>,
    pub amount_kes: u64,
    /// Normalized `2547XXXXXXXX`.
    pub phone_number: String,
    pub checkout_request_id: String,
    pub merchant_request_id: String,
}

/// What a callback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// No payment carries this checkout request id.
    Unmatched,
    /// The payment was already settled; nothing changed.
    Duplicate { payment: Payment },
    /// Paid and the subscription is now active.
    Activated {
        payment: Payment,
        subscription: UserSubscription,
    },
    /// Paid, but no plan matches the payment.
    PaidWithoutPlan { payment: Payment },
    /// The customer cancelled, timed out or had insufficient funds.
    Failed { payment: Payment },
}

impl Reconciliation {
    /// Short outcome name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::Duplicate { .. } => "duplicate",
            Self::Activated { .. } => "activated",
            Self::PaidWithoutPlan { .. } => "paid_without_plan",
            Self::Failed { .. } => "failed",
        }
    }
}

impl Store {
    /// Record a pending payment and index it by checkout request id.
    pub fn record_pending_payment(
        &self,
        pending: PendingPayment,
        now: Timestamp,
    ) -> Result<Payment, TwainError> {
        let checkout = pending.checkout_request_id.trim().to_string();
        if checkout.is_empty() {
            return Err(TwainError::Payment(
                "STK push returned no checkout request id".to_string(),
            ));
        }

        let mut payment = Payment {
            id: 0,
            user_id: pending.user_id,
            plan_id: pending.plan_id,
            amount_kes: pending.amount_kes,
            phone_number: pending.phone_number,
            transaction_id: None,
            status: PaymentStatus::Pending,
            created_at: now,
            checkout_request_id: Some(checkout.clone()),
            merchant_request_id: Some(pending.merchant_request_id).filter(|m| !m.is_empty()),
            result_desc: None,
            updated_at: None,
        };

        let txn = self.db.begin_write().map_err(storage_err)?;
        {
            let index = txn.open_table(CHECKOUT_INDEX).map_err(storage_err)?;
            if index.get(checkout.as_str()).map_err(storage_err)?.is_some() {
                return Err(TwainError::Conflict(format!(
                    "Checkout request {checkout} is already recorded"
                )));
            }
        }
        insert_in(&txn, &mut payment)?;
        {
            let mut index = txn.open_table(CHECKOUT_INDEX).map_err(storage_err)?;
            index
                .insert(checkout.as_str(), payment.id)
                .map_err(storage_err)?;
        }
        txn.commit().map_err(storage_err)?;
        Ok(payment)
    }

    /// Apply an STK callback. See the module docs for the outcomes.
    pub fn reconcile_callback(
        &self,
        callback: &StkCallback,
        now: Timestamp,
    ) -> Result<Reconciliation, TwainError> {
        let txn = self.db.begin_write().map_err(storage_err)?;

        let payment_id = {
            let index = txn.open_table(CHECKOUT_INDEX).map_err(storage_err)?;
            index
                .get(callback.checkout_request_id.as_str())
                .map_err(storage_err)?
                .map(|v| v.value())
        };
        let Some(payment_id) = payment_id else {
            return Ok(Reconciliation::Unmatched);
        };
        let Some(mut payment) = load::<Payment>(&txn, payment_id)? else {
            return Ok(Reconciliation::Unmatched);
        };

        if !payment.is_pending() {
            return Ok(Reconciliation::Duplicate { payment });
        }

        payment.result_desc = Some(callback.result_desc.clone());
        payment.updated_at = Some(now);

        let outcome = if callback.is_success() {
            payment.status = PaymentStatus::Success;
            payment.transaction_id = callback.receipt_number();
            put(&txn, &payment)?;

            match resolve_plan(&txn, &payment)? {
                Some(plan) => {
                    let subscription = activate_for(&txn, payment.user_id, &plan, now)?;
                    Reconciliation::Activated {
                        payment,
                        subscription,
                    }
                }
                None => Reconciliation::PaidWithoutPlan { payment },
            }
        } else {
            payment.status = PaymentStatus::Failed;
            put(&txn, &payment)?;
            Reconciliation::Failed { payment }
        };

        txn.commit().map_err(storage_err)?;
        Ok(outcome)
    }
}

/// The plan a payment pays for: matched by price, then by the plan it was started for.
fn resolve_plan(
    txn: &WriteTransaction,
    payment: &Payment,
) -> Result<Option<SubscriptionPlan>, TwainError> {
    let by_price = load_all::<SubscriptionPlan>(txn)?
        .into_iter()
        .find(|plan| plan.price_kes == payment.amount_kes);
    if by_price.is_some() {
        return Ok(by_price);
    }
    match payment.plan_id {
        Some(plan_id) => load::<SubscriptionPlan>(txn, plan_id),
        None => Ok(None),
    }
}

/// Get or create the user's subscription and activate it on `plan`.
fn activate_for(
    txn: &WriteTransaction,
    user_id: u64,
    plan: &SubscriptionPlan,
    now: Timestamp,
) -> Result<UserSubscription, TwainError> {
    let existing = load_all::<UserSubscription>(txn)?
        .into_iter()
        .find(|s| s.user_id == user_id);
    match existing {
        Some(mut sub) => {
            sub.activate(plan, now);
            put(txn, &sub)?;
            Ok(sub)
        }
        None => {
            let mut sub = UserSubscription::inactive(user_id);
            sub.activate(plan, now);
            insert_in(txn, &mut sub)?;
            Ok(sub)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpesa::{CallbackItem, CallbackMetadata, MetadataValue};
    use crate::{PlanType, SubscriptionStatus};
    use chrono::Utc;

    fn plan(name: &str, price: u64) -> SubscriptionPlan {
        SubscriptionPlan {
            id: 0,
            name: name.to_string(),
            slug: crate::slugify(name),
            plan_type: PlanType::Monthly,
            price_kes: price,
            description: String::new(),
            features: String::new(),
            badge: String::new(),
            highlighted: false,
            is_active: true,
            sort_order: 0,
        }
    }

    fn pending(user_id: u64, plan_id: Option<u64>, amount: u64, checkout: &str) -> PendingPayment {
        PendingPayment {
            user_id,
            plan_id,
            amount_kes: amount,
            phone_number: "254712345678".to_string(),
            checkout_request_id: checkout.to_string(),
            merchant_request_id: "m-1".to_string(),
        }
    }

    fn callback(checkout: &str, code: i64, receipt: Option<&str>) -> StkCallback {
        StkCallback {
            merchant_request_id: "m-1".to_string(),
            checkout_request_id: checkout.to_string(),
            result_code: code,
            result_desc: if code == 0 {
                "The service request is processed successfully.".to_string()
            } else {
                "Request cancelled by user".to_string()
            },
            metadata: receipt.map(|r| CallbackMetadata {
                items: vec![CallbackItem {
                    name: "MpesaReceiptNumber".to_string(),
                    value: Some(MetadataValue::Text(r.to_string())),
                }],
            }),
        }
    }

    #[test]
    fn success_activates_first_plan_at_paid_price() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        let first = store.insert(plan("Basic", 3000)).expect("plan");
        let chosen = store.insert(plan("Growth", 3000)).expect("plan");
        store
            .record_pending_payment(pending(7, Some(chosen.id), 3000, "ws_CO_1"), now)
            .expect("pending");

        let outcome = store
            .reconcile_callback(&callback("ws_CO_1", 0, Some("NLJ7RT61SV")), now)
            .expect("reconcile");

        let Reconciliation::Activated { payment, subscription } = outcome else {
            unreachable!("expected activation, got {outcome:?}");
        };
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.transaction_id.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(subscription.plan_id, Some(first.id));
        assert_eq!(subscription.status, SubscriptionStatus::Active);
        assert_eq!(store.subscription_for(7).expect("sub"), Some(subscription));
    }

    #[test]
    fn repriced_plan_falls_back_to_started_plan() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        let mut growth = store.insert(plan("Growth", 3000)).expect("plan");
        store
            .record_pending_payment(pending(8, Some(growth.id), 3000, "ws_CO_7"), now)
            .expect("pending");
        growth.price_kes = 3500;
        store.update(&growth).expect("reprice");

        let outcome = store
            .reconcile_callback(&callback("ws_CO_7", 0, Some("R7")), now)
            .expect("reconcile");
        assert!(matches!(
            outcome,
            Reconciliation::Activated { ref subscription, .. } if subscription.plan_id == Some(growth.id)
        ));
    }

    #[test]
    fn planless_payment_matches_by_price() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        let starter = store.insert(plan("Starter", 1500)).expect("plan");
        store
            .record_pending_payment(pending(1, None, 1500, "ws_CO_2"), now)
            .expect("pending");

        let outcome = store
            .reconcile_callback(&callback("ws_CO_2", 0, Some("R1")), now)
            .expect("reconcile");
        assert!(matches!(
            outcome,
            Reconciliation::Activated { ref subscription, .. } if subscription.plan_id == Some(starter.id)
        ));
    }

    #[test]
    fn unmatched_amount_is_paid_without_plan() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        store
            .record_pending_payment(pending(1, None, 77, "ws_CO_3"), now)
            .expect("pending");
        let outcome = store
            .reconcile_callback(&callback("ws_CO_3", 0, Some("R2")), now)
            .expect("reconcile");
        assert_eq!(outcome.label(), "paid_without_plan");
        assert!(store.subscription_for(1).expect("sub").is_none());
    }

    #[test]
    fn failure_marks_failed() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        store
            .record_pending_payment(pending(1, None, 1500, "ws_CO_4"), now)
            .expect("pending");
        let outcome = store
            .reconcile_callback(&callback("ws_CO_4", 1032, None), now)
            .expect("reconcile");
        let Reconciliation::Failed { payment } = outcome else {
            unreachable!("expected failure, got {outcome:?}");
        };
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.result_desc.as_deref(), Some("Request cancelled by user"));
        assert_eq!(payment.transaction_id, None);
    }

    #[test]
    fn replayed_callback_is_duplicate() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        store.insert(plan("Starter", 1500)).expect("plan");
        store
            .record_pending_payment(pending(1, None, 1500, "ws_CO_5"), now)
            .expect("pending");
        store
            .reconcile_callback(&callback("ws_CO_5", 0, Some("R3")), now)
            .expect("first");

        let again = store
            .reconcile_callback(&callback("ws_CO_5", 1, None), now)
            .expect("second");
        let Reconciliation::Duplicate { payment } = again else {
            unreachable!("expected duplicate, got {again:?}");
        };
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.transaction_id.as_deref(), Some("R3"));
    }

    #[test]
    fn unknown_checkout_is_unmatched() {
        let store = Store::in_memory().expect("store");
        let outcome = store
            .reconcile_callback(&callback("nope", 0, None), Utc::now())
            .expect("reconcile");
        assert_eq!(outcome, Reconciliation::Unmatched);
    }

    #[test]
    fn checkout_ids_are_unique() {
        let store = Store::in_memory().expect("store");
        let now = Utc::now();
        store
            .record_pending_payment(pending(1, None, 10, "ws_CO_6"), now)
            .expect("first");
        let err = store
            .record_pending_payment(pending(2, None, 10, "ws_CO_6"), now)
            .expect_err("second");
        assert!(matches!(err, TwainError::Conflict(_)));
    }

    #[test]
    fn renewal_keeps_start_date() {
        let store = Store::in_memory().expect("store");
        let first = Utc::now();
        let starter = store.insert(plan("Starter", 1500)).expect("plan");
        for (i, at) in [first, first + chrono::Duration::days(30)].into_iter().enumerate() {
            let checkout = format!("ws_CO_r{i}");
            store
                .record_pending_payment(pending(4, Some(starter.id), 1500, &checkout), at)
                .expect("pending");
            store
                .reconcile_callback(&callback(&checkout, 0, Some("R")), at)
                .expect("reconcile");
        }
        let sub = store.subscription_for(4).expect("q").expect("exists");
        assert_eq!(sub.started_at, Some(first));
        assert_eq!(sub.renewed_at, Some(first + chrono::Duration::days(30)));
        assert_eq!(store.count::<UserSubscription>().expect("count"), 1);
    }
}
