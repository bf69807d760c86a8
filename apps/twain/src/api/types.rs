//! # API Request/Response Types
//!
//! JSON bodies for the HTTP API. Records from `twain-core` are serialized
//! as-is; the types here cover forms, partial edits and page payloads.
//!
//! ## Partial edits
//!
//! The `*Fields` structs serve both create (`POST`) and edit (`PUT`).
//! Omitted fields keep their current value; on create they start from the
//! record's blank defaults, so required fields surface as validation errors.
//! Nullable references (`category_id`, media paths) distinguish "omitted"
//! from an explicit `null`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use twain_core::validate::slug_or_derive;
use twain_core::{
    ArticleRow, CaseStudy, KnowledgeArticle, KnowledgeAttachment, KnowledgeCategory, Message,
    MessageKind, NewUser, Payment, PlanType, Project, Service, SubscriptionPlan,
    SubscriptionStatus, Testimonial, Tool, User, UserSubscription, Urgency,
};

/// `null` becomes `Some(None)`, a missing key stays `None` (via `#[serde(default)]`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// COMMON
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Acknowledgement with a human message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// A list of rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

// =============================================================================
// PUBLIC SITE
// =============================================================================

/// Marketing page content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteResponse {
    pub services: Vec<Service>,
    pub testimonials: Vec<Testimonial>,
    pub case_studies: Vec<CaseStudy>,
}

/// Lead capture form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub business_name: String,
    pub platform: String,
    pub description: String,
}

impl ContactRequest {
    pub fn into_message(self, now: DateTime<Utc>) -> Message {
        Message::contact(
            self.name.trim(),
            self.email.trim(),
            self.business_name.trim(),
            self.platform.trim(),
            self.description.trim(),
            now,
        )
    }
}

/// `?token=` on the payment callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub token: Option<String>,
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupRequest {
    /// Public signups never create staff accounts.
    pub fn into_new_user(self) -> NewUser {
        NewUser {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
            confirm_password: self.confirm_password,
            is_staff: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<&User> for AccountResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_staff: user.is_staff,
            date_joined: user.date_joined,
        }
    }
}

/// Signup/login result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AccountResponse,
}

// =============================================================================
// DASHBOARD
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub username: String,
    /// One-shot greeting after signup or login.
    pub flash: Option<String>,
    pub plan: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub article_count: usize,
    pub tool_count: usize,
    pub payment_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeResponse {
    pub categories: Vec<KnowledgeCategory>,
    pub articles: Vec<KnowledgeArticle>,
    pub featured: Vec<KnowledgeArticle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleResponse {
    #[serde(flatten)]
    pub article: KnowledgeArticle,
    pub category: Option<KnowledgeCategory>,
    pub video_embed_url: String,
    pub attachments: Vec<KnowledgeAttachment>,
}

/// A plan with its features split out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanView {
    #[serde(flatten)]
    pub plan: SubscriptionPlan,
    pub plan_type_label: String,
    pub feature_list: Vec<String>,
}

impl From<SubscriptionPlan> for PlanView {
    fn from(plan: SubscriptionPlan) -> Self {
        Self {
            plan_type_label: plan.plan_type.label().to_string(),
            feature_list: plan.feature_list(),
            plan,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingResponse {
    pub monthly_plans: Vec<PlanView>,
    pub one_time_plans: Vec<PlanView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub pricing: PricingResponse,
    pub subscription: Option<UserSubscription>,
}

/// Support ticket form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportRequest {
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub urgency: Option<Urgency>,
}

// =============================================================================
// PAYMENTS
// =============================================================================

/// Pay for a plan from the subscription page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPlanRequest {
    pub phone_number: String,
}

/// Generic STK push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkPushBody {
    pub phone: String,
    pub amount: u64,
}

/// STK push accepted; the customer now confirms on their phone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkPushResult {
    pub success: bool,
    pub message: String,
    pub payment: Payment,
}

// =============================================================================
// ADMIN
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminOverview {
    pub message_count: usize,
    pub unread_count: usize,
    pub service_count: usize,
    pub case_count: usize,
    pub client_count: usize,
    pub recent_projects: Vec<Project>,
    pub recent_messages: Vec<Message>,
}

/// An inbox row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub kind: MessageKind,
    pub display_name: String,
    pub urgency_label: Option<String>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            kind: message.kind(),
            display_name: message.display_name(),
            urgency_label: message.urgency.map(|u| u.label().to_string()),
            message,
        }
    }
}

/// Everything the content manager page lists.
#[derive(Debug, Clone, Serialize)]
pub struct ContentResponse {
    pub services: Vec<Service>,
    pub case_studies: Vec<CaseStudy>,
    pub testimonials: Vec<Testimonial>,
    pub categories: Vec<KnowledgeCategory>,
    pub articles: Vec<ArticleRow>,
    pub tools: Vec<Tool>,
}

/// A partial edit for record type `R`.
pub trait Patch<R>: DeserializeOwned + Send + 'static {
    /// The starting point for a create.
    fn blank(now: DateTime<Utc>) -> R;

    fn apply(self, record: &mut R);

    fn into_record(self, now: DateTime<Utc>) -> R {
        let mut record = Self::blank(now);
        self.apply(&mut record);
        record
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceFields {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Patch<Service> for ServiceFields {
    fn blank(_now: DateTime<Utc>) -> Service {
        Service {
            id: 0,
            title: String::new(),
            description: String::new(),
        }
    }

    fn apply(self, service: &mut Service) {
        if let Some(v) = self.title {
            service.title = v;
        }
        if let Some(v) = self.description {
            service.description = v;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestimonialFields {
    pub client_name: Option<String>,
    pub feedback: Option<String>,
}

impl Patch<Testimonial> for TestimonialFields {
    fn blank(_now: DateTime<Utc>) -> Testimonial {
        Testimonial {
            id: 0,
            client_name: String::new(),
            feedback: String::new(),
        }
    }

    fn apply(self, testimonial: &mut Testimonial) {
        if let Some(v) = self.client_name {
            testimonial.client_name = v;
        }
        if let Some(v) = self.feedback {
            testimonial.feedback = v;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseStudyFields {
    pub project_name: Option<String>,
    pub outcome: Option<String>,
}

impl Patch<CaseStudy> for CaseStudyFields {
    fn blank(_now: DateTime<Utc>) -> CaseStudy {
        CaseStudy {
            id: 0,
            project_name: String::new(),
            outcome: String::new(),
        }
    }

    fn apply(self, case: &mut CaseStudy) {
        if let Some(v) = self.project_name {
            case.project_name = v;
        }
        if let Some(v) = self.outcome {
            case.outcome = v;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryFields {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<u32>,
    pub is_active: Option<bool>,
}

impl Patch<KnowledgeCategory> for CategoryFields {
    fn blank(_now: DateTime<Utc>) -> KnowledgeCategory {
        KnowledgeCategory {
            id: 0,
            name: String::new(),
            slug: String::new(),
            description: String::new(),
            sort_order: 0,
            is_active: true,
        }
    }

    fn apply(self, category: &mut KnowledgeCategory) {
        if let Some(v) = self.name {
            category.name = v;
        }
        if let Some(v) = self.slug {
            category.slug = v;
        }
        if let Some(v) = self.description {
            category.description = v;
        }
        if let Some(v) = self.sort_order {
            category.sort_order = v;
        }
        if let Some(v) = self.is_active {
            category.is_active = v;
        }
        category.slug = slug_or_derive(&category.slug, &category.name);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleFields {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub category_id: Option<Option<u64>>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub read_time_minutes: Option<u32>,
    pub featured: Option<bool>,
    pub is_published: Option<bool>,
    pub sort_order: Option<u32>,
    #[serde(deserialize_with = "nullable")]
    pub feature_image: Option<Option<String>>,
    pub video_url: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub video_file: Option<Option<String>>,
}

impl Patch<KnowledgeArticle> for ArticleFields {
    fn blank(now: DateTime<Utc>) -> KnowledgeArticle {
        KnowledgeArticle::new("", "", "", now)
    }

    fn apply(self, article: &mut KnowledgeArticle) {
        if let Some(v) = self.title {
            article.title = v;
        }
        if let Some(v) = self.slug {
            article.slug = v;
        }
        if let Some(v) = self.category_id {
            article.category_id = v;
        }
        if let Some(v) = self.summary {
            article.summary = v;
        }
        if let Some(v) = self.content {
            article.content = v;
        }
        if let Some(v) = self.read_time_minutes {
            article.read_time_minutes = v;
        }
        if let Some(v) = self.featured {
            article.featured = v;
        }
        if let Some(v) = self.is_published {
            article.is_published = v;
        }
        if let Some(v) = self.sort_order {
            article.sort_order = v;
        }
        if let Some(v) = self.feature_image {
            article.feature_image = v;
        }
        if let Some(v) = self.video_url {
            article.video_url = v;
        }
        if let Some(v) = self.video_file {
            article.video_file = v;
        }
        article.slug = slug_or_derive(&article.slug, &article.title);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRequest {
    pub name: String,
    pub file: String,
    #[serde(default)]
    pub sort_order: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolFields {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub website_url: Option<String>,
    pub sort_order: Option<u32>,
    pub is_active: Option<bool>,
}

impl Patch<Tool> for ToolFields {
    fn blank(_now: DateTime<Utc>) -> Tool {
        Tool {
            id: 0,
            name: String::new(),
            slug: String::new(),
            description: String::new(),
            icon: String::new(),
            website_url: String::new(),
            sort_order: 0,
            is_active: true,
        }
    }

    fn apply(self, tool: &mut Tool) {
        if let Some(v) = self.name {
            tool.name = v;
        }
        if let Some(v) = self.slug {
            tool.slug = v;
        }
        if let Some(v) = self.description {
            tool.description = v;
        }
        if let Some(v) = self.icon {
            tool.icon = v;
        }
        if let Some(v) = self.website_url {
            tool.website_url = v;
        }
        if let Some(v) = self.sort_order {
            tool.sort_order = v;
        }
        if let Some(v) = self.is_active {
            tool.is_active = v;
        }
        tool.slug = slug_or_derive(&tool.slug, &tool.name);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanFields {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub plan_type: Option<PlanType>,
    pub price_kes: Option<u64>,
    pub description: Option<String>,
    pub features: Option<String>,
    pub badge: Option<String>,
    pub highlighted: Option<bool>,
    pub is_active: Option<bool>,
    pub sort_order: Option<u32>,
}

impl Patch<SubscriptionPlan> for PlanFields {
    fn blank(_now: DateTime<Utc>) -> SubscriptionPlan {
        SubscriptionPlan {
            id: 0,
            name: String::new(),
            slug: String::new(),
            plan_type: PlanType::Monthly,
            price_kes: 0,
            description: String::new(),
            features: String::new(),
            badge: String::new(),
            highlighted: false,
            is_active: true,
            sort_order: 0,
        }
    }

    fn apply(self, plan: &mut SubscriptionPlan) {
        if let Some(v) = self.name {
            plan.name = v;
        }
        if let Some(v) = self.slug {
            plan.slug = v;
        }
        if let Some(v) = self.plan_type {
            plan.plan_type = v;
        }
        if let Some(v) = self.price_kes {
            plan.price_kes = v;
        }
        if let Some(v) = self.description {
            plan.description = v;
        }
        if let Some(v) = self.features {
            plan.features = v;
        }
        if let Some(v) = self.badge {
            plan.badge = v;
        }
        if let Some(v) = self.highlighted {
            plan.highlighted = v;
        }
        if let Some(v) = self.is_active {
            plan.is_active = v;
        }
        if let Some(v) = self.sort_order {
            plan.sort_order = v;
        }
        plan.slug = slug_or_derive(&plan.slug, &plan.name);
    }
}

/// CRM client record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRequest {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}
