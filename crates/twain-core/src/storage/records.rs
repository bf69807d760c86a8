//! Table layout and the [`Record`] impl for every record kind.

use super::redb_store::{load_all, put};
use super::{Record, UniqueKey};
use crate::types::storage_err;
use crate::{
    CaseStudy, Client, KnowledgeArticle, KnowledgeAttachment, KnowledgeCategory, Message,
    Payment, Project, Service, SubscriptionPlan, Testimonial, Tool, TwainError, User,
    UserSubscription,
};
use redb::{ReadableTable, TableDefinition, WriteTransaction};

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

// =============================================================================
// TABLES
// =============================================================================

const USERS: RecordTable = TableDefinition::new("users");
const MESSAGES: RecordTable = TableDefinition::new("messages");
const SERVICES: RecordTable = TableDefinition::new("services");
const TESTIMONIALS: RecordTable = TableDefinition::new("testimonials");
const CASE_STUDIES: RecordTable = TableDefinition::new("case_studies");
const CLIENTS: RecordTable = TableDefinition::new("clients");
const PROJECTS: RecordTable = TableDefinition::new("projects");
const CATEGORIES: RecordTable = TableDefinition::new("knowledge_categories");
const ARTICLES: RecordTable = TableDefinition::new("knowledge_articles");
const ATTACHMENTS: RecordTable = TableDefinition::new("knowledge_attachments");
const TOOLS: RecordTable = TableDefinition::new("tools");
const PLANS: RecordTable = TableDefinition::new("subscription_plans");
const SUBSCRIPTIONS: RecordTable = TableDefinition::new("user_subscriptions");
const PAYMENTS: RecordTable = TableDefinition::new("payments");

/// Per-kind id counters: `next_id.<kind>` -> last allocated id.
pub(crate) const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Checkout request id -> payment id.
pub(crate) const CHECKOUT_INDEX: TableDefinition<&str, u64> =
    TableDefinition::new("checkout_index");

/// BLAKE3 token digest -> postcard `AuthSession`.
pub(crate) const AUTH_SESSIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("auth_sessions");

/// Every record table, created on open.
pub(crate) const ALL_TABLES: &[RecordTable] = &[
    USERS,
    MESSAGES,
    SERVICES,
    TESTIMONIALS,
    CASE_STUDIES,
    CLIENTS,
    PROJECTS,
    CATEGORIES,
    ARTICLES,
    ATTACHMENTS,
    TOOLS,
    PLANS,
    SUBSCRIPTIONS,
    PAYMENTS,
];

/// Implements the id plumbing; the remaining items are spelled out per kind.
macro_rules! record_ids {
    () => {
        fn id(&self) -> u64 {
            self.id
        }

        fn set_id(&mut self, id: u64) {
            self.id = id;
        }

        fn check(&self) -> Result<(), TwainError> {
            self.validate()
        }
    };
}

// =============================================================================
// ACCOUNTS
// =============================================================================

impl Record for User {
    const KIND: &'static str = "user";
    const TABLE: RecordTable = USERS;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn check(&self) -> Result<(), TwainError> {
        crate::validate::required(
            "Username",
            &self.username,
            crate::primitives::MAX_USERNAME_LENGTH,
        )?;
        crate::validate::required("Email", &self.email, crate::primitives::MAX_EMAIL_LENGTH)
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new("username", &self.username, "Username already taken"),
            UniqueKey::new("email", &self.email, "Email already registered"),
        ]
    }

    /// Drop the user's subscription and every live session.
    fn on_delete(&self, txn: &WriteTransaction) -> Result<(), TwainError> {
        let mut subs = txn.open_table(SUBSCRIPTIONS).map_err(storage_err)?;
        let owned: Vec<u64> = super::redb_store::scan::<UserSubscription>(&subs)?
            .into_iter()
            .filter(|s| s.user_id == self.id)
            .map(|s| s.id)
            .collect();
        for id in owned {
            subs.remove(id).map_err(storage_err)?;
        }
        drop(subs);

        let mut sessions = txn.open_table(AUTH_SESSIONS).map_err(storage_err)?;
        let mut stale = Vec::new();
        for entry in sessions.iter().map_err(storage_err)? {
            let (digest, bytes) = entry.map_err(storage_err)?;
            let session: crate::AuthSession = super::redb_store::decode(bytes.value())?;
            if session.user_id == self.id {
                stale.push(digest.value().to_string());
            }
        }
        for digest in stale {
            sessions.remove(digest.as_str()).map_err(storage_err)?;
        }
        Ok(())
    }
}

// =============================================================================
// CONTENT
// =============================================================================

impl Record for Message {
    const KIND: &'static str = "message";
    const TABLE: RecordTable = MESSAGES;
    record_ids!();
}

impl Record for Service {
    const KIND: &'static str = "service";
    const TABLE: RecordTable = SERVICES;
    record_ids!();
}

impl Record for Testimonial {
    const KIND: &'static str = "testimonial";
    const TABLE: RecordTable = TESTIMONIALS;
    record_ids!();
}

impl Record for CaseStudy {
    const KIND: &'static str = "case study";
    const TABLE: RecordTable = CASE_STUDIES;
    record_ids!();
}

impl Record for Client {
    const KIND: &'static str = "client";
    const TABLE: RecordTable = CLIENTS;
    record_ids!();
}

impl Record for Project {
    const KIND: &'static str = "project";
    const TABLE: RecordTable = PROJECTS;
    record_ids!();
}

// =============================================================================
// KNOWLEDGE CENTRE
// =============================================================================

impl Record for KnowledgeCategory {
    const KIND: &'static str = "category";
    const TABLE: RecordTable = CATEGORIES;
    record_ids!();

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new("name", &self.name, "A category with this name already exists"),
            UniqueKey::new("slug", &self.slug, "A category with this slug already exists"),
        ]
    }

    /// Articles survive their category; they just become uncategorised.
    fn on_delete(&self, txn: &WriteTransaction) -> Result<(), TwainError> {
        for mut article in load_all::<KnowledgeArticle>(txn)? {
            if article.category_id == Some(self.id) {
                article.category_id = None;
                put(txn, &article)?;
            }
        }
        Ok(())
    }
}

impl Record for KnowledgeArticle {
    const KIND: &'static str = "article";
    const TABLE: RecordTable = ARTICLES;
    record_ids!();

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "slug",
            &self.slug,
            "An article with this slug already exists",
        )]
    }

    fn on_delete(&self, txn: &WriteTransaction) -> Result<(), TwainError> {
        let mut table = txn.open_table(ATTACHMENTS).map_err(storage_err)?;
        let orphans: Vec<u64> = super::redb_store::scan::<KnowledgeAttachment>(&table)?
            .into_iter()
            .filter(|a| a.article_id == self.id)
            .map(|a| a.id)
            .collect();
        for id in orphans {
            table.remove(id).map_err(storage_err)?;
        }
        Ok(())
    }
}

impl Record for KnowledgeAttachment {
    const KIND: &'static str = "attachment";
    const TABLE: RecordTable = ATTACHMENTS;
    record_ids!();
}

impl Record for Tool {
    const KIND: &'static str = "tool";
    const TABLE: RecordTable = TOOLS;
    record_ids!();

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new("name", &self.name, "A tool with this name already exists"),
            UniqueKey::new("slug", &self.slug, "A tool with this slug already exists"),
        ]
    }
}

// =============================================================================
// BILLING
// =============================================================================

impl Record for SubscriptionPlan {
    const KIND: &'static str = "plan";
    const TABLE: RecordTable = PLANS;
    record_ids!();

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new("name", &self.name, "A plan with this name already exists"),
            UniqueKey::new("slug", &self.slug, "A plan with this slug already exists"),
        ]
    }

    /// Subscriptions and payment history keep their rows but lose the link.
    fn on_delete(&self, txn: &WriteTransaction) -> Result<(), TwainError> {
        for mut sub in load_all::<UserSubscription>(txn)? {
            if sub.plan_id == Some(self.id) {
                sub.plan_id = None;
                put(txn, &sub)?;
            }
        }
        for mut payment in load_all::<Payment>(txn)? {
            if payment.plan_id == Some(self.id) {
                payment.plan_id = None;
                put(txn, &payment)?;
            }
        }
        Ok(())
    }
}

impl Record for UserSubscription {
    const KIND: &'static str = "subscription";
    const TABLE: RecordTable = SUBSCRIPTIONS;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn check(&self) -> Result<(), TwainError> {
        if self.user_id == 0 {
            return Err(TwainError::validation("Subscription must belong to a user"));
        }
        Ok(())
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new(
            "user",
            self.user_id.to_string(),
            "User already has a subscription",
        )]
    }
}

impl Record for Payment {
    const KIND: &'static str = "payment";
    const TABLE: RecordTable = PAYMENTS;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn check(&self) -> Result<(), TwainError> {
        crate::validate_amount(self.amount_kes)?;
        if crate::normalize_phone(&self.phone_number)? != self.phone_number {
            return Err(TwainError::validation("Enter a valid phone (2547XXXXXXXX)."));
        }
        Ok(())
    }

    fn on_delete(&self, txn: &WriteTransaction) -> Result<(), TwainError> {
        if let Some(checkout) = &self.checkout_request_id {
            let mut index = txn.open_table(CHECKOUT_INDEX).map_err(storage_err)?;
            index.remove(checkout.as_str()).map_err(storage_err)?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
