//! Integration tests for the Twain HTTP API.
//!
//! Uses axum-test against `create_router` with an in-memory store and a fake
//! STK gateway, so no server or network is involved.

#![allow(clippy::unwrap_used, clippy::panic)]

use async_trait::async_trait;
use axum::http::{HeaderValue, StatusCode, header};
use axum_test::{TestRequest, TestServer};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use twain::api::types::{AuthResponse, HealthResponse, ListResponse, MessageResponse, StkPushResult};
use twain::api::{AppState, create_router};
use twain::config::AppConfig;
use twain::mpesa::{GatewayError, StkGateway};
use twain_core::mpesa::StkPushResponse;
use twain_core::{
    KnowledgeArticle, KnowledgeCategory, NewUser, PaymentStatus, PlanType, Store,
    SubscriptionPlan, SubscriptionStatus,
};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Records pushes and hands out sequential checkout ids.
#[derive(Default)]
struct FakeGateway {
    next: AtomicU64,
    pushes: Mutex<Vec<(String, u64)>>,
}

#[async_trait]
impl StkGateway for FakeGateway {
    async fn stk_push(
        &self,
        phone: &str,
        amount_kes: u64,
        _reference: &str,
        _description: &str,
    ) -> Result<StkPushResponse, GatewayError> {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.pushes.lock().unwrap().push((phone.to_string(), amount_kes));
        Ok(StkPushResponse {
            merchant_request_id: format!("mr-{n}"),
            checkout_request_id: format!("ws_CO_{n}"),
            response_code: "0".to_string(),
            response_description: "Success. Request accepted for processing".to_string(),
            customer_message: "Success. Request accepted for processing".to_string(),
        })
    }
}

struct Harness {
    server: TestServer,
    store: Arc<Store>,
    gateway: Arc<FakeGateway>,
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.rate_limit = 0;
    config
}

fn harness_with(config: AppConfig, payments: bool) -> Harness {
    let gateway = Arc::new(FakeGateway::default());
    let mut state = AppState::new(Store::in_memory().unwrap(), config);
    if payments {
        state = state.with_gateway(gateway.clone());
    }
    let store = state.store.clone();
    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        store,
        gateway,
    }
}

fn harness() -> Harness {
    harness_with(test_config(), true)
}

fn bearer(token: &str) -> HeaderValue {
    format!("Bearer {token}").parse::<HeaderValue>().unwrap()
}

fn authed(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(header::AUTHORIZATION, bearer(token))
}

async fn signup(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/accounts/signup")
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "correct-horse",
            "confirm_password": "correct-horse",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<AuthResponse>().token
}

fn staff_token(store: &Store) -> String {
    let user = store
        .create_user(
            NewUser {
                username: "boss".to_string(),
                email: "boss@twain.co.ke".to_string(),
                password: "staff-password".to_string(),
                confirm_password: "staff-password".to_string(),
                is_staff: true,
            },
            Utc::now(),
        )
        .unwrap();
    store
        .open_session(user.id, None, Utc::now(), chrono::Duration::hours(1))
        .unwrap()
}

fn seed_plan(store: &Store, name: &str, price_kes: u64, is_active: bool) -> SubscriptionPlan {
    store
        .insert(SubscriptionPlan {
            id: 0,
            name: name.to_string(),
            slug: twain_core::slugify(name),
            plan_type: PlanType::Monthly,
            price_kes,
            description: String::new(),
            features: "Catalogue, Broadcasts".to_string(),
            badge: String::new(),
            highlighted: false,
            is_active,
            sort_order: 0,
        })
        .unwrap()
}

fn callback_body(checkout: &str, result_code: i64, receipt: Option<&str>) -> Value {
    let mut callback = json!({
        "MerchantRequestID": "mr-1",
        "CheckoutRequestID": checkout,
        "ResultCode": result_code,
        "ResultDesc": if result_code == 0 { "The service request is processed successfully." } else { "Request cancelled by user" },
    });
    if let Some(receipt) = receipt {
        callback["CallbackMetadata"] = json!({
            "Item": [
                {"Name": "Amount", "Value": 1500},
                {"Name": "MpesaReceiptNumber", "Value": receipt},
                {"Name": "PhoneNumber", "Value": 254712345678u64}
            ]
        });
    }
    json!({ "Body": { "stkCallback": callback } })
}

// =============================================================================
// PUBLIC ENDPOINTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let h = harness();
    let response = h.server.get("/health").await;
    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_health_wrong_method() {
    let h = harness();
    let response = h.server.post("/health").await;
    assert_eq!(response.status_code().as_u16(), 405);
}

#[tokio::test]
async fn test_contact_is_stored_unread() {
    let h = harness();
    let response = h
        .server
        .post("/contact")
        .json(&json!({
            "name": "Wanjiru",
            "email": "wanjiru@shop.co.ke",
            "business_name": "Shop",
            "platform": "WhatsApp",
            "description": "Need a catalogue bot",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(
        response.json::<MessageResponse>().message,
        "Your request has been submitted successfully!"
    );

    let stats = h.store.stats().unwrap();
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.unread_messages, 1);
}

#[tokio::test]
async fn test_empty_contact_rejected() {
    let h = harness();
    let response = h.server.post("/contact").json(&json!({})).await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_site_lists_marketing_content() {
    let h = harness();
    let token = staff_token(&h.store);
    let created = authed(h.server.post("/admin/content/services"), &token)
        .json(&json!({"title": "Chatbots", "description": "WhatsApp automation"}))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);

    let response = h.server.get("/site").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["services"][0]["title"], "Chatbots");
    assert_eq!(body["testimonials"], json!([]));
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[tokio::test]
async fn test_signup_then_dashboard_flash_once() {
    let h = harness();
    let token = signup(&h.server, "alice").await;

    let first = authed(h.server.get("/dashboard"), &token).await;
    first.assert_status_ok();
    let body: Value = first.json();
    assert_eq!(
        body["flash"],
        "Account created successfully! Welcome, alice."
    );
    assert_eq!(body["subscription_status"], "inactive");

    let second: Value = authed(h.server.get("/dashboard"), &token).await.json();
    assert_eq!(second["flash"], Value::Null);
}

#[tokio::test]
async fn test_signup_password_mismatch() {
    let h = harness();
    let response = h
        .server
        .post("/accounts/signup")
        .json(&json!({
            "username": "bob",
            "email": "bob@example.com",
            "password": "correct-horse",
            "confirm_password": "battery-staple",
        }))
        .await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"], "Passwords do not match");
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let h = harness();
    signup(&h.server, "alice").await;
    let response = h
        .server
        .post("/accounts/signup")
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "correct-horse",
            "confirm_password": "correct-horse",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"], "Username already taken");
}

#[tokio::test]
async fn test_signup_never_grants_staff() {
    let h = harness();
    let response = h
        .server
        .post("/accounts/signup")
        .json(&json!({
            "username": "sneaky",
            "email": "sneaky@example.com",
            "password": "correct-horse",
            "confirm_password": "correct-horse",
            "is_staff": true,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let auth: AuthResponse = response.json();
    assert!(!auth.user.is_staff);

    let admin = authed(h.server.get("/admin"), &auth.token).await;
    assert_eq!(admin.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_and_logout() {
    let h = harness();
    signup(&h.server, "alice").await;

    let bad = h
        .server
        .post("/accounts/login")
        .json(&json!({"username": "alice", "password": "wrong-password"}))
        .await;
    assert_eq!(bad.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(bad.json::<Value>()["error"], "Invalid username or password");

    let good = h
        .server
        .post("/accounts/login")
        .json(&json!({"username": "alice", "password": "correct-horse"}))
        .await;
    good.assert_status_ok();
    let token = good.json::<AuthResponse>().token;

    let flash: Value = authed(h.server.get("/dashboard"), &token).await.json();
    assert_eq!(flash["flash"], "Welcome back, alice!");

    authed(h.server.post("/accounts/logout"), &token)
        .await
        .assert_status_ok();
    let after = authed(h.server.get("/accounts/me"), &token).await;
    assert_eq!(after.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dashboard_requires_login() {
    let h = harness();
    let response = h.server.get("/dashboard").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let bogus = authed(h.server.get("/dashboard"), "not-a-session").await;
    assert_eq!(bogus.status_code(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// DASHBOARD
// =============================================================================

#[tokio::test]
async fn test_knowledge_hides_drafts() {
    let h = harness();
    let token = signup(&h.server, "alice").await;

    let category = h
        .store
        .insert(KnowledgeCategory {
            id: 0,
            name: "Getting Started".to_string(),
            slug: "getting-started".to_string(),
            description: String::new(),
            sort_order: 0,
            is_active: true,
        })
        .unwrap();
    let mut published = KnowledgeArticle::new("Intro", "intro", "Welcome", Utc::now());
    published.category_id = Some(category.id);
    published.video_url = "https://youtu.be/abc123".to_string();
    h.store.insert(published).unwrap();
    let mut draft = KnowledgeArticle::new("Draft", "draft", "Soon", Utc::now());
    draft.is_published = false;
    h.store.insert(draft).unwrap();

    let list: Value = authed(h.server.get("/dashboard/knowledge"), &token)
        .await
        .json();
    assert_eq!(list["articles"].as_array().unwrap().len(), 1);
    assert_eq!(list["categories"][0]["slug"], "getting-started");

    let detail = authed(h.server.get("/dashboard/knowledge/intro"), &token).await;
    detail.assert_status_ok();
    let body: Value = detail.json();
    assert_eq!(body["category"]["name"], "Getting Started");
    assert_eq!(body["video_embed_url"], "https://www.youtube.com/embed/abc123");

    let hidden = authed(h.server.get("/dashboard/knowledge/draft"), &token).await;
    hidden.assert_status_not_found();
}

#[tokio::test]
async fn test_support_ticket_requires_problem() {
    let h = harness();
    let token = signup(&h.server, "alice").await;

    let empty = authed(h.server.post("/dashboard/support"), &token)
        .json(&json!({"problem": "  "}))
        .await;
    empty.assert_status_bad_request();

    let ok = authed(h.server.post("/dashboard/support"), &token)
        .json(&json!({"problem": "Bot is down", "urgency": "High"}))
        .await;
    assert_eq!(ok.status_code(), StatusCode::CREATED);

    let staff = staff_token(&h.store);
    let inbox: Value = authed(h.server.get("/admin/messages"), &staff)
        .add_query_param("kind", "support")
        .await
        .json();
    assert_eq!(inbox["count"], 1);
    assert_eq!(inbox["items"][0]["urgency_label"], "Critical");
}

#[tokio::test]
async fn test_pricing_splits_plan_types() {
    let h = harness();
    let token = signup(&h.server, "alice").await;
    seed_plan(&h.store, "Starter", 1500, true);
    seed_plan(&h.store, "Retired", 900, false);

    let pricing: Value = authed(h.server.get("/dashboard/pricing"), &token)
        .await
        .json();
    let monthly = pricing["monthly_plans"].as_array().unwrap();
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0]["feature_list"], json!(["Catalogue", "Broadcasts"]));
    assert_eq!(pricing["one_time_plans"], json!([]));
}

// =============================================================================
// PAYMENTS
// =============================================================================

#[tokio::test]
async fn test_pay_plan_then_callback_activates_subscription() {
    let h = harness();
    let token = signup(&h.server, "alice").await;
    let plan = seed_plan(&h.store, "Starter", 1500, true);

    let response = authed(
        h.server.post(&format!("/dashboard/subscription/{}/pay", plan.id)),
        &token,
    )
    .json(&json!({"phone_number": "0712 345 678"}))
    .await;
    response.assert_status_ok();
    let result: StkPushResult = response.json();
    assert_eq!(result.payment.status, PaymentStatus::Pending);
    assert_eq!(result.payment.phone_number, "254712345678");
    assert_eq!(
        h.gateway.pushes.lock().unwrap().as_slice(),
        &[("254712345678".to_string(), 1500)]
    );

    let checkout = result.payment.checkout_request_id.clone().unwrap();
    let ack = h
        .server
        .post("/payments/callback")
        .json(&callback_body(&checkout, 0, Some("QK123ABC")))
        .await;
    ack.assert_status_ok();
    assert_eq!(ack.json::<Value>(), json!({"ResultCode": 0, "ResultDesc": "Accepted"}));

    let subscription: Value = authed(h.server.get("/dashboard/subscription"), &token)
        .await
        .json();
    assert_eq!(subscription["subscription"]["status"], "active");
    assert_eq!(subscription["subscription"]["plan_id"], plan.id);

    let payments: ListResponse<twain_core::Payment> =
        authed(h.server.get("/dashboard/payments"), &token).await.json();
    assert_eq!(payments.items[0].status, PaymentStatus::Success);
    assert_eq!(payments.items[0].transaction_id.as_deref(), Some("QK123ABC"));
}

#[tokio::test]
async fn test_replayed_callback_is_acknowledged_without_change() {
    let h = harness();
    let token = signup(&h.server, "alice").await;
    let plan = seed_plan(&h.store, "Starter", 1500, true);
    let result: StkPushResult = authed(
        h.server.post(&format!("/dashboard/subscription/{}/pay", plan.id)),
        &token,
    )
    .json(&json!({"phone_number": "254712345678"}))
    .await
    .json();
    let checkout = result.payment.checkout_request_id.unwrap();

    h.server
        .post("/payments/callback")
        .json(&callback_body(&checkout, 0, Some("QK1")))
        .await
        .assert_status_ok();
    let replay = h
        .server
        .post("/payments/callback")
        .json(&callback_body(&checkout, 1032, None))
        .await;
    replay.assert_status_ok();

    let payment = h.store.payments_for_user(result.payment.user_id).unwrap();
    assert_eq!(payment[0].status, PaymentStatus::Success);
    assert_eq!(payment[0].transaction_id.as_deref(), Some("QK1"));
}

#[tokio::test]
async fn test_cancelled_callback_marks_failed() {
    let h = harness();
    let token = signup(&h.server, "alice").await;
    let result: StkPushResult = authed(h.server.post("/payments/stk-push"), &token)
        .json(&json!({"phone": "+254712345678", "amount": 10}))
        .await
        .json();
    let checkout = result.payment.checkout_request_id.unwrap();

    h.server
        .post("/payments/callback")
        .json(&callback_body(&checkout, 1032, None))
        .await
        .assert_status_ok();

    let payments = h.store.payments_for_user(result.payment.user_id).unwrap();
    assert_eq!(payments[0].status, PaymentStatus::Failed);
    let sub = h.store.subscription_for(result.payment.user_id).unwrap();
    assert!(sub.is_none_or(|s| s.status != SubscriptionStatus::Active));
}

#[tokio::test]
async fn test_pay_inactive_plan_is_not_found() {
    let h = harness();
    let token = signup(&h.server, "alice").await;
    let plan = seed_plan(&h.store, "Retired", 900, false);

    let response = authed(
        h.server.post(&format!("/dashboard/subscription/{}/pay", plan.id)),
        &token,
    )
    .json(&json!({"phone_number": "0712345678"}))
    .await;
    response.assert_status_not_found();
    assert!(h.gateway.pushes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_phone_rejected_before_push() {
    let h = harness();
    let token = signup(&h.server, "alice").await;
    let plan = seed_plan(&h.store, "Starter", 1500, true);

    let response = authed(
        h.server.post(&format!("/dashboard/subscription/{}/pay", plan.id)),
        &token,
    )
    .json(&json!({"phone_number": "12345"}))
    .await;
    response.assert_status_bad_request();
    assert_eq!(
        response.json::<Value>()["error"],
        "Enter a valid phone (2547XXXXXXXX)."
    );
    assert!(h.gateway.pushes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_payments_disabled_without_gateway() {
    let h = harness_with(test_config(), false);
    let token = signup(&h.server, "alice").await;
    let response = authed(h.server.post("/payments/stk-push"), &token)
        .json(&json!({"phone": "0712345678", "amount": 10}))
        .await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);

    // The webhook still answers.
    h.server
        .post("/payments/callback")
        .json(&callback_body("ws_CO_unknown", 0, None))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_unmatched_callback_acked_without_touching_payments() {
    let h = harness();
    let token = signup(&h.server, "wekesa").await;
    let pushed: StkPushResult = authed(h.server.post("/payments/stk-push"), &token)
        .json(&json!({"phone": "0712345678", "amount": 250}))
        .await
        .json();

    let ack = h
        .server
        .post("/payments/callback")
        .json(&callback_body("ws_CO_not_recorded_yet", 0, Some("QK0LATE")))
        .await;
    ack.assert_status_ok();
    assert_eq!(ack.json::<Value>(), json!({"ResultCode": 0, "ResultDesc": "Accepted"}));

    let stats = h.store.stats().unwrap();
    assert_eq!(stats.pending_payments, 1);
    assert_eq!(stats.subscriptions, 0);
    let payments: ListResponse<twain_core::Payment> =
        authed(h.server.get("/dashboard/payments"), &token).await.json();
    assert_eq!(payments.items[0].id, pushed.payment.id);
    assert_eq!(payments.items[0].status, PaymentStatus::Pending);
    assert_eq!(payments.items[0].transaction_id, None);
}

#[tokio::test]
async fn test_callback_token_enforced() {
    let mut config = test_config();
    config.mpesa.callback_token = Some("hush".to_string());
    let h = harness_with(config, true);

    let missing = h
        .server
        .post("/payments/callback")
        .json(&callback_body("ws_CO_1", 0, None))
        .await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

    let wrong = h
        .server
        .post("/payments/callback")
        .add_query_param("token", "loud")
        .json(&callback_body("ws_CO_1", 0, None))
        .await;
    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);

    let right = h
        .server
        .post("/payments/callback")
        .add_query_param("token", "hush")
        .json(&callback_body("ws_CO_1", 0, None))
        .await;
    right.assert_status_ok();
}

#[tokio::test]
async fn test_callback_invalid_json() {
    let h = harness();
    let response = h
        .server
        .post("/payments/callback")
        .bytes(bytes::Bytes::from("not valid json"))
        .content_type("application/json")
        .await;
    response.assert_status_bad_request();

    let odd_shape = h.server.post("/payments/callback").json(&json!({"hello": 1})).await;
    odd_shape.assert_status_ok();
    assert_eq!(odd_shape.json::<Value>()["ResultCode"], 0);
}

// =============================================================================
// ADMIN
// =============================================================================

#[tokio::test]
async fn test_admin_requires_staff() {
    let h = harness();
    let anonymous = h.server.get("/admin").await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let member = signup(&h.server, "alice").await;
    let forbidden = authed(h.server.get("/admin"), &member).await;
    assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

    let staff = staff_token(&h.store);
    authed(h.server.get("/admin"), &staff).await.assert_status_ok();
}

#[tokio::test]
async fn test_admin_inbox_read_flow() {
    let h = harness();
    let staff = staff_token(&h.store);
    let contact = h
        .server
        .post("/contact")
        .json(&json!({"name": "Otieno", "email": "o@example.com", "business_name": "Duka"}))
        .await;
    assert_eq!(contact.status_code(), StatusCode::CREATED);

    let overview: Value = authed(h.server.get("/admin"), &staff).await.json();
    assert_eq!(overview["unread_count"], 1);
    let id = overview["recent_messages"][0]["id"].as_u64().unwrap();

    let opened: Value = authed(h.server.get(&format!("/admin/messages/{id}")), &staff)
        .await
        .json();
    assert_eq!(opened["is_read"], true);
    assert_eq!(opened["kind"], "contact");

    let unread: Value = authed(h.server.get("/admin/messages"), &staff)
        .add_query_param("status", "unread")
        .await
        .json();
    assert_eq!(unread["count"], 0);

    let toggled: Value = authed(
        h.server.post(&format!("/admin/messages/{id}/toggle-read")),
        &staff,
    )
    .await
    .json();
    assert_eq!(toggled["is_read"], false);

    authed(h.server.delete(&format!("/admin/messages/{id}")), &staff)
        .await
        .assert_status_ok();
    let gone = authed(h.server.get(&format!("/admin/messages/{id}")), &staff).await;
    gone.assert_status_not_found();
}

#[tokio::test]
async fn test_admin_partial_edit_keeps_fields() {
    let h = harness();
    let staff = staff_token(&h.store);
    let created: Value = authed(h.server.post("/admin/content/services"), &staff)
        .json(&json!({"title": "Bots", "description": "Original"}))
        .await
        .json();
    let id = created["id"].as_u64().unwrap();

    let edited: Value = authed(h.server.put(&format!("/admin/content/services/{id}")), &staff)
        .json(&json!({"title": "Chatbots"}))
        .await
        .json();
    assert_eq!(edited["title"], "Chatbots");
    assert_eq!(edited["description"], "Original");
}

#[tokio::test]
async fn test_admin_category_slug_derived_and_unique() {
    let h = harness();
    let staff = staff_token(&h.store);
    let first = authed(h.server.post("/admin/categories"), &staff)
        .json(&json!({"name": "Getting Started"}))
        .await;
    assert_eq!(first.status_code(), StatusCode::CREATED);
    assert_eq!(first.json::<Value>()["slug"], "getting-started");

    let dup = authed(h.server.post("/admin/categories"), &staff)
        .json(&json!({"name": "Other", "slug": "getting-started"}))
        .await;
    assert_eq!(dup.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_article_with_unknown_category() {
    let h = harness();
    let staff = staff_token(&h.store);
    let response = authed(h.server.post("/admin/knowledge"), &staff)
        .json(&json!({"title": "Intro", "content": "Body", "category_id": 99}))
        .await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["error"], "Unknown category");
}

#[tokio::test]
async fn test_admin_article_and_attachment_cascade() {
    let h = harness();
    let staff = staff_token(&h.store);
    let article: Value = authed(h.server.post("/admin/knowledge"), &staff)
        .json(&json!({"title": "Setting Up Payments", "content": "Steps"}))
        .await
        .json();
    assert_eq!(article["slug"], "setting-up-payments");
    let id = article["id"].as_u64().unwrap();

    let attachment = authed(
        h.server.post(&format!("/admin/knowledge/{id}/attachments")),
        &staff,
    )
    .json(&json!({"name": "Checklist", "file": "knowledge/attachments/checklist.pdf"}))
    .await;
    assert_eq!(attachment.status_code(), StatusCode::CREATED);

    authed(h.server.delete(&format!("/admin/knowledge/{id}")), &staff)
        .await
        .assert_status_ok();
    assert_eq!(h.store.stats().unwrap().attachments, 0);
}

#[tokio::test]
async fn test_admin_subscription_cancel_and_activate() {
    let h = harness();
    let token = signup(&h.server, "alice").await;
    let plan = seed_plan(&h.store, "Starter", 1500, true);
    let result: StkPushResult = authed(
        h.server.post(&format!("/dashboard/subscription/{}/pay", plan.id)),
        &token,
    )
    .json(&json!({"phone_number": "0712345678"}))
    .await
    .json();
    h.server
        .post("/payments/callback")
        .json(&callback_body(
            result.payment.checkout_request_id.as_deref().unwrap(),
            0,
            Some("QK9"),
        ))
        .await
        .assert_status_ok();

    let staff = staff_token(&h.store);
    let clients: Value = authed(h.server.get("/admin/clients"), &staff).await.json();
    assert_eq!(clients["items"][0]["username"], "alice");
    assert_eq!(clients["items"][0]["plan_name"], "Starter");
    let sub_id = clients["items"][0]["id"].as_u64().unwrap();

    let cancelled: Value = authed(
        h.server.post(&format!("/admin/clients/{sub_id}/cancel")),
        &staff,
    )
    .await
    .json();
    assert_eq!(cancelled["status"], "canceled");

    let activated: Value = authed(
        h.server.post(&format!("/admin/clients/{sub_id}/activate")),
        &staff,
    )
    .await
    .json();
    assert_eq!(activated["status"], "active");

    let payments: Value = authed(h.server.get("/admin/payments"), &staff).await.json();
    assert_eq!(payments["count"], 1);
}

#[tokio::test]
async fn test_admin_projects_and_crm() {
    let h = harness();
    let staff = staff_token(&h.store);

    let project: Value = authed(h.server.post("/admin/projects"), &staff)
        .json(&json!({"name": "Duka bot"}))
        .await
        .json();
    assert_eq!(project["status"], "Pending");

    let client = authed(h.server.post("/admin/crm/clients"), &staff)
        .json(&json!({"name": "Duka Ltd", "email": "hello@duka.co.ke"}))
        .await;
    assert_eq!(client.status_code(), StatusCode::CREATED);

    let overview: Value = authed(h.server.get("/admin"), &staff).await.json();
    assert_eq!(overview["client_count"], 1);
    assert_eq!(overview["recent_projects"][0]["name"], "Duka bot");
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let mut config = test_config();
    config.server.rate_limit = 2;
    let h = harness_with(config, false);

    let mut statuses = Vec::new();
    for _ in 0..5 {
        statuses.push(h.server.get("/health").await.status_code().as_u16());
    }
    assert!(statuses.contains(&429));
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let h = harness();
    let huge = "x".repeat(3 * 1024 * 1024);
    let response = h
        .server
        .post("/contact")
        .json(&json!({"name": "Big", "description": huge}))
        .await;
    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.store.stats().unwrap().messages, 0);
}

#[tokio::test]
async fn test_cors_allows_localhost_only_by_default() {
    let h = harness();
    let allowed = h
        .server
        .get("/health")
        .add_header(header::ORIGIN, HeaderValue::from_static("http://localhost:3000"))
        .await;
    assert_eq!(
        allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(&HeaderValue::from_static("http://localhost:3000"))
    );

    let foreign = h
        .server
        .get("/health")
        .add_header(header::ORIGIN, HeaderValue::from_static("https://evil.example"))
        .await;
    assert!(foreign.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
