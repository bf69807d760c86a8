//! Member dashboard: knowledge centre, tools, plans and support.

use super::{Created, created};
use crate::api::AppState;
use crate::api::auth::CurrentUser;
use crate::api::error::ApiError;
use crate::api::types::{
    ArticleResponse, DashboardResponse, KnowledgeResponse, ListResponse, MessageResponse,
    PlanView, PricingResponse, SubscriptionResponse, SupportRequest,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use twain_core::{
    KnowledgeArticle, KnowledgeCategory, Message, Payment, Record, SubscriptionPlan, Tool,
    TwainError,
};

fn pricing(state: &AppState) -> Result<PricingResponse, ApiError> {
    let (monthly, one_time) = state.store.plans_by_type()?;
    Ok(PricingResponse {
        monthly_plans: monthly.into_iter().map(PlanView::from).collect(),
        one_time_plans: one_time.into_iter().map(PlanView::from).collect(),
    })
}

/// Overview plus the one-shot greeting.
pub async fn dashboard_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let user = &current.user;
    let flash = state
        .store
        .take_flash(&current.token)?
        .map(|f| f.message(&user.username));

    let subscription = state.store.subscription_for(user.id)?;
    let plan = match subscription.as_ref().and_then(|s| s.plan_id) {
        Some(plan_id) => state
            .store
            .get::<SubscriptionPlan>(plan_id)?
            .map(|p| p.name),
        None => None,
    };

    Ok(Json(DashboardResponse {
        username: user.username.clone(),
        flash,
        plan,
        subscription_status: subscription.map(|s| s.status).unwrap_or_default(),
        article_count: state.store.published_articles()?.len(),
        tool_count: state.store.active_tools()?.len(),
        payment_count: state.store.payments_for_user(user.id)?.len(),
    }))
}

pub async fn knowledge_handler(
    State(state): State<AppState>,
) -> Result<Json<KnowledgeResponse>, ApiError> {
    Ok(Json(KnowledgeResponse {
        categories: state.store.active_categories()?,
        articles: state.store.published_articles()?,
        featured: state.store.featured_articles()?,
    }))
}

/// A published article by slug; drafts are indistinguishable from missing.
pub async fn article_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state
        .store
        .published_article_by_slug(&slug)?
        .ok_or_else(|| TwainError::NotFound {
            kind: KnowledgeArticle::KIND,
            key: slug.clone(),
        })?;
    let category = match article.category_id {
        Some(id) => state.store.get::<KnowledgeCategory>(id)?,
        None => None,
    };
    Ok(Json(ArticleResponse {
        category,
        video_embed_url: article.video_embed_url(),
        attachments: state.store.attachments_for(article.id)?,
        article,
    }))
}

pub async fn tools_handler(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Tool>>, ApiError> {
    Ok(Json(state.store.active_tools()?.into()))
}

pub async fn subscription_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    Ok(Json(SubscriptionResponse {
        pricing: pricing(&state)?,
        subscription: state.store.subscription_for(current.user.id)?,
    }))
}

pub async fn pricing_handler(
    State(state): State<AppState>,
) -> Result<Json<PricingResponse>, ApiError> {
    Ok(Json(pricing(&state)?))
}

/// Raise a support ticket.
pub async fn support_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<SupportRequest>,
) -> Result<Created<MessageResponse>, ApiError> {
    let problem = request.problem.trim();
    if problem.is_empty() {
        return Err(ApiError::BadRequest("Please describe the problem".to_string()));
    }
    let message = state
        .store
        .insert(Message::support(problem, request.urgency, Utc::now()))?;
    tracing::info!(
        event = "support_ticket",
        message_id = message.id,
        user_id = current.user.id,
        "Support ticket raised"
    );
    created(MessageResponse::ok(
        "Your support request has been sent. We will get back to you shortly.",
    ))
}

pub async fn payments_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ListResponse<Payment>>, ApiError> {
    Ok(Json(state.store.payments_for_user(current.user.id)?.into()))
}
