//! # twain-core
//!
//! The record model and store for Twain - THE MODEL.
//!
//! Twain is a small-business marketing and operations application: a public
//! site that captures leads, a customer dashboard (knowledge centre, tools
//! directory, subscription plans), an admin back-office, and an M-Pesa STK
//! Push flow that activates subscriptions.
//!
//! This crate owns every record and every state transition. The app crate
//! only parses requests, calls into the [`Store`], and renders JSON.
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - Multi-record mutations (unique checks, cascades, payment reconciliation)
//!   run inside a single redb write transaction
//! - Money is integer Kenyan shillings

// =============================================================================
// MODULES
// =============================================================================

pub mod accounts;
pub mod billing;
pub mod content;
pub mod knowledge;
pub mod mpesa;
pub mod primitives;
pub mod reconcile;
pub mod storage;
pub mod tools;
pub mod types;
pub mod validate;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{Timestamp, TwainError};

// =============================================================================
// RE-EXPORTS: Records
// =============================================================================

pub use accounts::{AuthSession, Flash, NewUser, User};
pub use billing::{
    Payment, PaymentStatus, PlanType, SubscriptionPlan, SubscriptionStatus, UserSubscription,
    normalize_phone, validate_amount,
};
pub use content::{
    CaseStudy, Client, Message, MessageFilter, MessageKind, Project, ReadStatus, Service,
    Testimonial, Urgency,
};
pub use knowledge::{KnowledgeArticle, KnowledgeAttachment, KnowledgeCategory};
pub use tools::Tool;

// =============================================================================
// RE-EXPORTS: Store & Reconciliation
// =============================================================================

pub use reconcile::{PendingPayment, Reconciliation};
pub use storage::{ArticleRow, Record, Store, StoreStats, SubscriptionAction, SubscriptionRow};
pub use validate::slugify;
