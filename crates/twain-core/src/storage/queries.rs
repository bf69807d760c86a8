//! Read models for the dashboard and back-office, plus the handful of
//! single-row state changes they trigger.

use super::redb_store::{load, put};
use super::{Record, Store};
use crate::primitives::RECENT_ITEMS;
use crate::types::storage_err;
use crate::{
    CaseStudy, Client, KnowledgeArticle, KnowledgeAttachment, KnowledgeCategory, Message,
    MessageFilter, Payment, PaymentStatus, PlanType, Project, Service, SubscriptionPlan,
    Testimonial, Timestamp, Tool, TwainError, User, UserSubscription,
};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Record counts across the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: usize,
    pub messages: usize,
    pub unread_messages: usize,
    pub services: usize,
    pub testimonials: usize,
    pub case_studies: usize,
    pub clients: usize,
    pub projects: usize,
    pub categories: usize,
    pub articles: usize,
    pub attachments: usize,
    pub tools: usize,
    pub plans: usize,
    pub subscriptions: usize,
    pub active_subscriptions: usize,
    pub payments: usize,
    pub pending_payments: usize,
}

/// Admin action on a customer's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    Activate,
    Cancel,
}

/// Admin article listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRow {
    #[serde(flatten)]
    pub article: KnowledgeArticle,
    pub category_name: Option<String>,
}

/// Admin client listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRow {
    #[serde(flatten)]
    pub subscription: UserSubscription,
    pub username: String,
    pub plan_name: Option<String>,
}

impl Store {
    // =========================================================================
    // KNOWLEDGE CENTRE
    // =========================================================================

    pub fn active_categories(&self) -> Result<Vec<KnowledgeCategory>, TwainError> {
        let mut rows: Vec<_> = self
            .list::<KnowledgeCategory>()?
            .into_iter()
            .filter(|c| c.is_active)
            .collect();
        rows.sort_by(KnowledgeCategory::display_order);
        Ok(rows)
    }

    pub fn published_articles(&self) -> Result<Vec<KnowledgeArticle>, TwainError> {
        let mut rows: Vec<_> = self
            .list::<KnowledgeArticle>()?
            .into_iter()
            .filter(|a| a.is_published)
            .collect();
        rows.sort_by(KnowledgeArticle::display_order);
        Ok(rows)
    }

    pub fn featured_articles(&self) -> Result<Vec<KnowledgeArticle>, TwainError> {
        Ok(self
            .published_articles()?
            .into_iter()
            .filter(|a| a.featured)
            .collect())
    }

    pub fn published_article_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<KnowledgeArticle>, TwainError> {
        Ok(self
            .list::<KnowledgeArticle>()?
            .into_iter()
            .find(|a| a.is_published && a.slug == slug))
    }

    pub fn attachments_for(&self, article_id: u64) -> Result<Vec<KnowledgeAttachment>, TwainError> {
        let mut rows: Vec<_> = self
            .list::<KnowledgeAttachment>()?
            .into_iter()
            .filter(|a| a.article_id == article_id)
            .collect();
        rows.sort_by(KnowledgeAttachment::display_order);
        Ok(rows)
    }

    /// Every article, newest first, with its category name.
    pub fn admin_articles(&self) -> Result<Vec<ArticleRow>, TwainError> {
        let names: BTreeMap<u64, String> = self
            .list::<KnowledgeCategory>()?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let mut articles = self.list::<KnowledgeArticle>()?;
        articles.sort_by_key(|a| Reverse(a.published_at));
        Ok(articles
            .into_iter()
            .map(|article| ArticleRow {
                category_name: article.category_id.and_then(|id| names.get(&id).cloned()),
                article,
            })
            .collect())
    }

    // =========================================================================
    // TOOLS & PLANS
    // =========================================================================

    pub fn active_tools(&self) -> Result<Vec<Tool>, TwainError> {
        let mut rows: Vec<_> = self
            .list::<Tool>()?
            .into_iter()
            .filter(|t| t.is_active)
            .collect();
        rows.sort_by(Tool::display_order);
        Ok(rows)
    }

    pub fn active_plans(&self) -> Result<Vec<SubscriptionPlan>, TwainError> {
        let mut rows: Vec<_> = self
            .list::<SubscriptionPlan>()?
            .into_iter()
            .filter(|p| p.is_active)
            .collect();
        rows.sort_by(SubscriptionPlan::display_order);
        Ok(rows)
    }

    /// Active plans split into `(monthly, one_time)`.
    pub fn plans_by_type(&self) -> Result<(Vec<SubscriptionPlan>, Vec<SubscriptionPlan>), TwainError> {
        Ok(self
            .active_plans()?
            .into_iter()
            .partition(|p| p.plan_type == PlanType::Monthly))
    }

    pub fn subscription_for(&self, user_id: u64) -> Result<Option<UserSubscription>, TwainError> {
        Ok(self
            .list::<UserSubscription>()?
            .into_iter()
            .find(|s| s.user_id == user_id))
    }

    /// Customer subscriptions, most recently started first, never-started last.
    pub fn subscriptions_for_admin(&self) -> Result<Vec<SubscriptionRow>, TwainError> {
        let users: BTreeMap<u64, String> = self
            .list::<User>()?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();
        let plans: BTreeMap<u64, String> = self
            .list::<SubscriptionPlan>()?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let mut subs = self.list::<UserSubscription>()?;
        subs.sort_by_key(|s| (s.started_at.is_none(), Reverse(s.started_at)));
        Ok(subs
            .into_iter()
            .map(|subscription| SubscriptionRow {
                username: users.get(&subscription.user_id).cloned().unwrap_or_default(),
                plan_name: subscription.plan_id.and_then(|id| plans.get(&id).cloned()),
                subscription,
            })
            .collect())
    }

    /// Flip an admin-controlled subscription state.
    pub fn set_subscription_state(
        &self,
        id: u64,
        action: SubscriptionAction,
        now: Timestamp,
    ) -> Result<UserSubscription, TwainError> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        let mut sub = load::<UserSubscription>(&txn, id)?
            .ok_or_else(|| TwainError::not_found(UserSubscription::KIND, id))?;
        match action {
            SubscriptionAction::Activate => sub.reinstate(now),
            SubscriptionAction::Cancel => sub.cancel(now),
        }
        put(&txn, &sub)?;
        txn.commit().map_err(storage_err)?;
        Ok(sub)
    }

    // =========================================================================
    // INBOX, CRM & PAYMENTS
    // =========================================================================

    /// Inbox, newest first.
    pub fn messages(&self, filter: MessageFilter) -> Result<Vec<Message>, TwainError> {
        let mut rows: Vec<_> = self
            .list::<Message>()?
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect();
        rows.sort_by_key(|m| (Reverse(m.created_at), Reverse(m.id)));
        Ok(rows)
    }

    pub fn recent_messages(&self, n: usize) -> Result<Vec<Message>, TwainError> {
        let mut rows = self.messages(MessageFilter::default())?;
        rows.truncate(n);
        Ok(rows)
    }

    pub fn recent_projects(&self, n: usize) -> Result<Vec<Project>, TwainError> {
        let mut rows = self.list::<Project>()?;
        rows.sort_by_key(|p| (Reverse(p.created_at), Reverse(p.id)));
        rows.truncate(n);
        Ok(rows)
    }

    /// Open a message: mark it read and return it.
    pub fn mark_message_read(&self, id: u64) -> Result<Message, TwainError> {
        self.edit_message(id, |m| m.is_read = true)
    }

    pub fn toggle_message_read(&self, id: u64) -> Result<Message, TwainError> {
        self.edit_message(id, |m| m.is_read = !m.is_read)
    }

    fn edit_message(&self, id: u64, edit: impl FnOnce(&mut Message)) -> Result<Message, TwainError> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        let mut message = load::<Message>(&txn, id)?
            .ok_or_else(|| TwainError::not_found(Message::KIND, id))?;
        edit(&mut message);
        put(&txn, &message)?;
        txn.commit().map_err(storage_err)?;
        Ok(message)
    }

    pub fn payments_for_user(&self, user_id: u64) -> Result<Vec<Payment>, TwainError> {
        let mut rows: Vec<_> = self
            .list::<Payment>()?
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .collect();
        rows.sort_by_key(|p| (Reverse(p.created_at), Reverse(p.id)));
        Ok(rows)
    }

    /// Latest payments across all users.
    pub fn recent_payments(&self, limit: usize) -> Result<Vec<Payment>, TwainError> {
        let mut rows = self.list::<Payment>()?;
        rows.sort_by_key(|p| (Reverse(p.created_at), Reverse(p.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    // =========================================================================
    // STATS
    // =========================================================================

    pub fn stats(&self) -> Result<StoreStats, TwainError> {
        let messages = self.list::<Message>()?;
        let subscriptions = self.list::<UserSubscription>()?;
        let payments = self.list::<Payment>()?;
        Ok(StoreStats {
            users: self.count::<User>()?,
            messages: messages.len(),
            unread_messages: messages.iter().filter(|m| !m.is_read).count(),
            services: self.count::<Service>()?,
            testimonials: self.count::<Testimonial>()?,
            case_studies: self.count::<CaseStudy>()?,
            clients: self.count::<Client>()?,
            projects: self.count::<Project>()?,
            categories: self.count::<KnowledgeCategory>()?,
            articles: self.count::<KnowledgeArticle>()?,
            attachments: self.count::<KnowledgeAttachment>()?,
            tools: self.count::<Tool>()?,
            plans: self.count::<SubscriptionPlan>()?,
            subscriptions: subscriptions.len(),
            active_subscriptions: subscriptions.iter().filter(|s| s.is_active()).count(),
            payments: payments.len(),
            pending_payments: payments
                .iter()
                .filter(|p| p.status == PaymentStatus::Pending)
                .count(),
        })
    }

    /// The admin overview's "recent" panels.
    pub fn admin_recent(&self) -> Result<(Vec<Project>, Vec<Message>), TwainError> {
        Ok((
            self.recent_projects(RECENT_ITEMS)?,
            self.recent_messages(RECENT_ITEMS)?,
        ))
    }
}

// =============================================================================
// TESTS
// =============================================================================
