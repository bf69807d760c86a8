//! # Twain HTTP API Module
//!
//! JSON API over axum. Routes fall into three groups:
//!
//! - public: `/health`, `/site`, `/contact`, `/accounts/signup`,
//!   `/accounts/login`, `/payments/callback`
//! - member (session token): `/accounts/*`, `/dashboard/*`, `/payments/stk-push`
//! - staff (session token of a staff user): `/admin/*`
//!
//! ## Security Configuration
//!
//! - `[server] cors_origins` / `TWAIN_CORS_ORIGINS`: comma-separated list of
//!   allowed origins, or "*" for all (default: localhost only)
//! - `[server] rate_limit` / `TWAIN_RATE_LIMIT`: requests per second
//!   (default: 100, 0 to disable)
//! - `[mpesa] callback_token` / `TWAIN_MPESA_CALLBACK_TOKEN`: shared secret
//!   the payment callback must carry as `?token=`

pub mod auth;
pub mod error;
mod handlers;
mod middleware;
pub mod types;

pub use error::ApiError;
pub use middleware::create_rate_limiter;

use crate::config::AppConfig;
use crate::mpesa::StkGateway;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use handlers::{accounts, admin, dashboard, payments, public};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use twain_core::{
    CaseStudy, Client, KnowledgeArticle, KnowledgeAttachment, KnowledgeCategory, Message,
    Service, Store, SubscriptionPlan, Testimonial, Tool, TwainError,
};
use types::{CaseStudyFields, CategoryFields, PlanFields, ServiceFields, TestimonialFields, ToolFields};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    /// `None` when M-Pesa is not configured; payment initiation then answers 503.
    pub gateway: Option<Arc<dyn StkGateway>>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Store, config: AppConfig) -> Self {
        Self {
            store: Arc::new(store),
            gateway: None,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn with_gateway(mut self, gateway: Arc<dyn StkGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer:
/// - `"*"`: allow all origins
/// - unset: localhost only
/// - otherwise: the comma-separated list
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins.map(str::trim) {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) if !trimmed.is_empty() => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Ok(_) => None,
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                with_api_methods(CorsLayer::new().allow_origin(allowed_origins))
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    with_api_methods(CorsLayer::new().allow_origin(origins))
}

fn with_api_methods(layer: CorsLayer) -> CorsLayer {
    layer
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTES
// =============================================================================

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(public::health_handler))
        .route("/site", get(public::site_handler))
        .route("/contact", post(public::contact_handler))
        .route("/accounts/signup", post(accounts::signup_handler))
        .route("/accounts/login", post(accounts::login_handler))
        .route("/payments/callback", post(payments::callback_handler))
}

fn member_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/accounts/logout", post(accounts::logout_handler))
        .route("/accounts/me", get(accounts::me_handler))
        .route("/dashboard", get(dashboard::dashboard_handler))
        .route("/dashboard/knowledge", get(dashboard::knowledge_handler))
        .route("/dashboard/knowledge/{slug}", get(dashboard::article_handler))
        .route("/dashboard/tools", get(dashboard::tools_handler))
        .route("/dashboard/subscription", get(dashboard::subscription_handler))
        .route(
            "/dashboard/subscription/{plan_id}/pay",
            post(payments::pay_plan_handler),
        )
        .route("/dashboard/pricing", get(dashboard::pricing_handler))
        .route("/dashboard/support", post(dashboard::support_handler))
        .route("/dashboard/settings", get(accounts::me_handler))
        .route("/dashboard/payments", get(dashboard::payments_handler))
        .route("/payments/stk-push", post(payments::stk_push_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_login,
        ))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin", get(admin::overview_handler))
        .route("/admin/messages", get(admin::messages_handler))
        .route(
            "/admin/messages/{id}",
            get(admin::message_handler).delete(admin::delete_record::<Message>),
        )
        .route(
            "/admin/messages/{id}/toggle-read",
            post(admin::toggle_read_handler),
        )
        .route("/admin/content", get(admin::content_handler))
        .route(
            "/admin/content/services",
            post(admin::create_record::<Service, ServiceFields>),
        )
        .route(
            "/admin/content/services/{id}",
            put(admin::update_record::<Service, ServiceFields>)
                .delete(admin::delete_record::<Service>),
        )
        .route(
            "/admin/content/testimonials",
            post(admin::create_record::<Testimonial, TestimonialFields>),
        )
        .route(
            "/admin/content/testimonials/{id}",
            put(admin::update_record::<Testimonial, TestimonialFields>)
                .delete(admin::delete_record::<Testimonial>),
        )
        .route(
            "/admin/content/case-studies",
            post(admin::create_record::<CaseStudy, CaseStudyFields>),
        )
        .route(
            "/admin/content/case-studies/{id}",
            put(admin::update_record::<CaseStudy, CaseStudyFields>)
                .delete(admin::delete_record::<CaseStudy>),
        )
        .route(
            "/admin/knowledge",
            get(admin::articles_handler).post(admin::create_article_handler),
        )
        .route(
            "/admin/knowledge/{id}",
            put(admin::update_article_handler)
                .delete(admin::delete_record::<KnowledgeArticle>),
        )
        .route(
            "/admin/knowledge/{id}/attachments",
            post(admin::create_attachment_handler),
        )
        .route(
            "/admin/attachments/{id}",
            delete(admin::delete_record::<KnowledgeAttachment>),
        )
        .route(
            "/admin/categories",
            get(admin::list_records::<KnowledgeCategory>)
                .post(admin::create_record::<KnowledgeCategory, CategoryFields>),
        )
        .route(
            "/admin/categories/{id}",
            put(admin::update_record::<KnowledgeCategory, CategoryFields>)
                .delete(admin::delete_record::<KnowledgeCategory>),
        )
        .route(
            "/admin/tools",
            get(admin::list_records::<Tool>).post(admin::create_record::<Tool, ToolFields>),
        )
        .route(
            "/admin/tools/{id}",
            put(admin::update_record::<Tool, ToolFields>)
                .delete(admin::delete_record::<Tool>),
        )
        .route(
            "/admin/plans",
            get(admin::list_records::<SubscriptionPlan>)
                .post(admin::create_record::<SubscriptionPlan, PlanFields>),
        )
        .route(
            "/admin/plans/{id}",
            put(admin::update_record::<SubscriptionPlan, PlanFields>)
                .delete(admin::delete_record::<SubscriptionPlan>),
        )
        .route("/admin/clients", get(admin::subscriptions_handler))
        .route(
            "/admin/clients/{id}/activate",
            post(admin::activate_subscription_handler),
        )
        .route(
            "/admin/clients/{id}/cancel",
            post(admin::cancel_subscription_handler),
        )
        .route(
            "/admin/crm/clients",
            get(admin::list_records::<Client>).post(admin::create_client_handler),
        )
        .route(
            "/admin/projects",
            get(admin::projects_handler).post(admin::create_project_handler),
        )
        .route("/admin/payments", get(admin::payments_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_staff,
        ))
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - global token bucket (if enabled)
/// 5. Session auth - per route group
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(state.config.server.cors_origins.as_deref());

    let rate_limit = state.config.server.rate_limit;
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    if state.gateway.is_none() {
        tracing::warn!("M-Pesa is not configured; payment initiation will answer 503");
    }
    if state.config.callback_token().is_none() {
        tracing::warn!("No callback token set; /payments/callback accepts any caller");
    }

    let mut router = Router::new()
        .merge(public_routes())
        .merge(member_routes(&state))
        .merge(admin_routes(&state));

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind `addr` and serve until Ctrl-C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), TwainError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TwainError::Storage(format!("Bind failed: {}", e)))?;

    tracing::info!("Twain HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| TwainError::Storage(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
