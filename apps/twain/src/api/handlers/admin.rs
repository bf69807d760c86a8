//! # Staff Back-Office
//!
//! Inbox, content management, knowledge base, plans, subscriptions,
//! CRM records and payment history.
//!
//! Simple record kinds share the generic [`list_records`],
//! [`create_record`], [`update_record`] and [`delete_record`] handlers,
//! parameterised by record type and its [`Patch`] fields.

use super::{Created, created};
use crate::api::AppState;
use crate::api::auth::CurrentUser;
use crate::api::error::ApiError;
use crate::api::types::{
    AdminOverview, ArticleFields, AttachmentRequest, ClientRequest, ContentResponse,
    ListResponse, MessageResponse, MessageView, Patch, ProjectRequest,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use twain_core::{
    ArticleRow, CaseStudy, Client, KnowledgeArticle, KnowledgeAttachment, KnowledgeCategory,
    Message, MessageFilter, Payment, Project, Record, Service, SubscriptionAction,
    SubscriptionRow, Testimonial, Tool, UserSubscription,
};

const DEFAULT_PAYMENT_LIMIT: usize = 50;

// =============================================================================
// GENERIC RECORD HANDLERS
// =============================================================================

pub async fn list_records<R>(State(state): State<AppState>) -> Result<Json<ListResponse<R>>, ApiError>
where
    R: Record + Serialize + Send + 'static,
{
    Ok(Json(state.store.list::<R>()?.into()))
}

pub async fn create_record<R, F>(
    State(state): State<AppState>,
    Json(fields): Json<F>,
) -> Result<Created<R>, ApiError>
where
    R: Record + Serialize + Send + 'static,
    F: Patch<R>,
{
    let record = state.store.insert(fields.into_record(Utc::now()))?;
    tracing::info!(event = "record_created", kind = R::KIND, id = record.id(), "Created");
    created(record)
}

/// Partial edit: omitted fields keep their stored value.
pub async fn update_record<R, F>(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(fields): Json<F>,
) -> Result<Json<R>, ApiError>
where
    R: Record + Serialize + Send + 'static,
    F: Patch<R>,
{
    let mut record = state.store.require::<R>(id)?;
    fields.apply(&mut record);
    state.store.update(&record)?;
    Ok(Json(record))
}

pub async fn delete_record<R>(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<MessageResponse>, ApiError>
where
    R: Record + Send + 'static,
{
    state.store.delete::<R>(id)?;
    tracing::info!(event = "record_deleted", kind = R::KIND, id, "Deleted");
    Ok(Json(MessageResponse::ok(format!("Deleted {} {id}", R::KIND))))
}

// =============================================================================
// OVERVIEW & CONTENT
// =============================================================================

pub async fn overview_handler(
    State(state): State<AppState>,
) -> Result<Json<AdminOverview>, ApiError> {
    let stats = state.store.stats()?;
    let (recent_projects, recent_messages) = state.store.admin_recent()?;
    Ok(Json(AdminOverview {
        message_count: stats.messages,
        unread_count: stats.unread_messages,
        service_count: stats.services,
        case_count: stats.case_studies,
        client_count: stats.clients,
        recent_projects,
        recent_messages,
    }))
}

pub async fn content_handler(
    State(state): State<AppState>,
) -> Result<Json<ContentResponse>, ApiError> {
    Ok(Json(ContentResponse {
        services: state.store.list::<Service>()?,
        case_studies: state.store.list::<CaseStudy>()?,
        testimonials: state.store.list::<Testimonial>()?,
        categories: state.store.list::<KnowledgeCategory>()?,
        articles: state.store.admin_articles()?,
        tools: state.store.list::<Tool>()?,
    }))
}

// =============================================================================
// INBOX
// =============================================================================

pub async fn messages_handler(
    State(state): State<AppState>,
    Query(filter): Query<MessageFilter>,
) -> Result<Json<ListResponse<MessageView>>, ApiError> {
    let rows: Vec<MessageView> = state
        .store
        .messages(filter)?
        .into_iter()
        .map(MessageView::from)
        .collect();
    Ok(Json(rows.into()))
}

/// Opening a message marks it read.
pub async fn message_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<MessageView>, ApiError> {
    Ok(Json(state.store.mark_message_read(id)?.into()))
}

pub async fn toggle_read_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<MessageView>, ApiError> {
    let message: Message = state.store.toggle_message_read(id)?;
    Ok(Json(message.into()))
}

// =============================================================================
// KNOWLEDGE BASE
// =============================================================================

fn check_category(state: &AppState, category_id: Option<u64>) -> Result<(), ApiError> {
    match category_id {
        Some(id) if state.store.get::<KnowledgeCategory>(id)?.is_none() => {
            Err(ApiError::BadRequest("Unknown category".to_string()))
        }
        _ => Ok(()),
    }
}

/// Every article, drafts included, with its category name.
pub async fn articles_handler(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<ArticleRow>>, ApiError> {
    Ok(Json(state.store.admin_articles()?.into()))
}

pub async fn create_article_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(fields): Json<ArticleFields>,
) -> Result<Created<KnowledgeArticle>, ApiError> {
    let mut article = fields.into_record(Utc::now());
    check_category(&state, article.category_id)?;
    article.author_id = Some(current.user.id);
    let article = state.store.insert(article)?;
    tracing::info!(event = "record_created", kind = KnowledgeArticle::KIND, id = article.id, "Created");
    created(article)
}

pub async fn update_article_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(fields): Json<ArticleFields>,
) -> Result<Json<KnowledgeArticle>, ApiError> {
    let mut article = state.store.require::<KnowledgeArticle>(id)?;
    fields.apply(&mut article);
    check_category(&state, article.category_id)?;
    article.updated_at = Utc::now();
    state.store.update(&article)?;
    Ok(Json(article))
}

pub async fn create_attachment_handler(
    State(state): State<AppState>,
    Path(article_id): Path<u64>,
    Json(request): Json<AttachmentRequest>,
) -> Result<Created<KnowledgeAttachment>, ApiError> {
    state.store.require::<KnowledgeArticle>(article_id)?;
    created(state.store.insert(KnowledgeAttachment {
        id: 0,
        article_id,
        name: request.name.trim().to_string(),
        file: request.file.trim().to_string(),
        sort_order: request.sort_order,
    })?)
}

// =============================================================================
// SUBSCRIPTIONS & PAYMENTS
// =============================================================================

pub async fn subscriptions_handler(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<SubscriptionRow>>, ApiError> {
    Ok(Json(state.store.subscriptions_for_admin()?.into()))
}

pub async fn activate_subscription_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<UserSubscription>, ApiError> {
    set_state(&state, id, SubscriptionAction::Activate)
}

pub async fn cancel_subscription_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<UserSubscription>, ApiError> {
    set_state(&state, id, SubscriptionAction::Cancel)
}

fn set_state(
    state: &AppState,
    id: u64,
    action: SubscriptionAction,
) -> Result<Json<UserSubscription>, ApiError> {
    let subscription = state.store.set_subscription_state(id, action, Utc::now())?;
    tracing::info!(
        event = "subscription_state",
        subscription_id = id,
        action = ?action,
        "Subscription updated by staff"
    );
    Ok(Json(subscription))
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaymentsQuery {
    pub limit: Option<usize>,
}

/// Most recent payments first.
pub async fn payments_handler(
    State(state): State<AppState>,
    Query(query): Query<PaymentsQuery>,
) -> Result<Json<ListResponse<Payment>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAYMENT_LIMIT);
    Ok(Json(state.store.recent_payments(limit)?.into()))
}

// =============================================================================
// CRM
// =============================================================================

pub async fn create_client_handler(
    State(state): State<AppState>,
    Json(request): Json<ClientRequest>,
) -> Result<Created<Client>, ApiError> {
    created(state.store.insert(Client {
        id: 0,
        name: request.name.trim().to_string(),
        email: request.email.trim().to_string(),
        created_at: Utc::now(),
    })?)
}

/// Projects, newest first.
pub async fn projects_handler(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Project>>, ApiError> {
    Ok(Json(state.store.recent_projects(usize::MAX)?.into()))
}

pub async fn create_project_handler(
    State(state): State<AppState>,
    Json(request): Json<ProjectRequest>,
) -> Result<Created<Project>, ApiError> {
    created(state.store.insert(Project::new(
        request.name.trim(),
        request.status,
        Utc::now(),
    ))?)
}
