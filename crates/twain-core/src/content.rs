//! # Site Content & Inbox
//!
//! Marketing records (services, testimonials, case studies), the CRM-lite
//! client/project lists, and the shared inbox.
//!
//! ## Inbox
//!
//! Contact requests from the public site and support tickets from the
//! dashboard land in the same `Message` table. [`Message::kind`] tells them
//! apart by which fields are filled in.

use crate::primitives::{
    DEFAULT_PROJECT_STATUS, MAX_BUSINESS_NAME_LENGTH, MAX_CLIENT_NAME_LENGTH, MAX_EMAIL_LENGTH,
    MAX_MESSAGE_NAME_LENGTH, MAX_PLATFORM_LENGTH, MAX_PROJECT_NAME_LENGTH,
    MAX_RECORD_NAME_LENGTH, MAX_SERVICE_TITLE_LENGTH, MAX_STATUS_LENGTH, MAX_TEXT_LENGTH,
};
use crate::validate::{max_length, optional_email, required};
use crate::{Timestamp, TwainError};
use serde::{Deserialize, Serialize};

// =============================================================================
// MESSAGES
// =============================================================================

/// How urgent a support ticket is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    /// General inquiry.
    Low,
    /// Issue affecting workflow.
    Medium,
    /// Critical.
    High,
}

impl Urgency {
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "General Inquiry",
            Self::Medium => "Issue affecting workflow",
            Self::High => "Critical",
        }
    }
}

/// Which form a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Contact,
    Support,
    Other,
}

/// A contact request or support ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    // Website contact fields
    pub name: String,
    pub email: String,
    pub business_name: String,
    /// WhatsApp, Instagram, ...
    pub platform: String,
    pub description: String,
    // Dashboard support fields
    pub problem: String,
    pub urgency: Option<Urgency>,
    pub is_read: bool,
    pub created_at: Timestamp,
}

impl Message {
    /// A contact request from the public site.
    pub fn contact(
        name: impl Into<String>,
        email: impl Into<String>,
        business_name: impl Into<String>,
        platform: impl Into<String>,
        description: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            email: email.into(),
            business_name: business_name.into(),
            platform: platform.into(),
            description: description.into(),
            problem: String::new(),
            urgency: None,
            is_read: false,
            created_at: now,
        }
    }

    /// A support ticket raised from the dashboard.
    pub fn support(problem: impl Into<String>, urgency: Option<Urgency>, now: Timestamp) -> Self {
        Self {
            id: 0,
            name: String::new(),
            email: String::new(),
            business_name: String::new(),
            platform: String::new(),
            description: String::new(),
            problem: problem.into(),
            urgency,
            is_read: false,
            created_at: now,
        }
    }

    pub fn kind(&self) -> MessageKind {
        if !self.name.is_empty() && !self.email.is_empty() && !self.business_name.is_empty() {
            MessageKind::Contact
        } else if !self.problem.is_empty() {
            MessageKind::Support
        } else {
            MessageKind::Other
        }
    }

    /// Human label used in inbox listings.
    pub fn display_name(&self) -> String {
        let name = if self.name.is_empty() { "Anonymous" } else { &self.name };
        let email = if self.email.is_empty() { "No email" } else { &self.email };
        format!("{name} — {email}")
    }

    pub fn validate(&self) -> Result<(), TwainError> {
        max_length("Name", &self.name, MAX_MESSAGE_NAME_LENGTH)?;
        max_length("Email", &self.email, MAX_EMAIL_LENGTH)?;
        optional_email("Email", &self.email)?;
        max_length("Business name", &self.business_name, MAX_BUSINESS_NAME_LENGTH)?;
        max_length("Platform", &self.platform, MAX_PLATFORM_LENGTH)?;
        max_length("Description", &self.description, MAX_TEXT_LENGTH)?;
        max_length("Problem", &self.problem, MAX_TEXT_LENGTH)?;
        if self.name.trim().is_empty()
            && self.email.trim().is_empty()
            && self.description.trim().is_empty()
            && self.problem.trim().is_empty()
        {
            return Err(TwainError::validation("Message is empty"));
        }
        Ok(())
    }
}

/// Read-state filter for the admin inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    #[default]
    All,
    Read,
    Unread,
}

/// Admin inbox filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageFilter {
    #[serde(default)]
    pub status: ReadStatus,
    #[serde(default)]
    pub kind: Option<MessageKind>,
}

impl MessageFilter {
    pub fn matches(&self, message: &Message) -> bool {
        let status_ok = match self.status {
            ReadStatus::All => true,
            ReadStatus::Read => message.is_read,
            ReadStatus::Unread => !message.is_read,
        };
        status_ok && self.kind.is_none_or(|k| message.kind() == k)
    }
}

// =============================================================================
// MARKETING CONTENT
// =============================================================================

/// A service offered on the marketing site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: u64,
    pub title: String,
    pub description: String,
}

impl Service {
    pub fn validate(&self) -> Result<(), TwainError> {
        required("Title", &self.title, MAX_SERVICE_TITLE_LENGTH)?;
        required("Description", &self.description, MAX_TEXT_LENGTH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: u64,
    pub client_name: String,
    pub feedback: String,
}

impl Testimonial {
    pub fn validate(&self) -> Result<(), TwainError> {
        required("Client name", &self.client_name, MAX_CLIENT_NAME_LENGTH)?;
        required("Feedback", &self.feedback, MAX_TEXT_LENGTH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseStudy {
    pub id: u64,
    pub project_name: String,
    pub outcome: String,
}

impl CaseStudy {
    pub fn validate(&self) -> Result<(), TwainError> {
        required("Project name", &self.project_name, MAX_PROJECT_NAME_LENGTH)?;
        required("Outcome", &self.outcome, MAX_TEXT_LENGTH)
    }
}

// =============================================================================
// CRM
// =============================================================================

/// A client record kept by the agency (not a login).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub created_at: Timestamp,
}

impl Client {
    pub fn validate(&self) -> Result<(), TwainError> {
        required("Name", &self.name, MAX_RECORD_NAME_LENGTH)?;
        required("Email", &self.email, MAX_EMAIL_LENGTH)?;
        optional_email("Email", &self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub status: String,
    pub created_at: Timestamp,
}

impl Project {
    pub fn new(name: impl Into<String>, status: Option<String>, now: Timestamp) -> Self {
        Self {
            id: 0,
            name: name.into(),
            status: status
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROJECT_STATUS.to_string()),
            created_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), TwainError> {
        required("Name", &self.name, MAX_RECORD_NAME_LENGTH)?;
        required("Status", &self.status, MAX_STATUS_LENGTH)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn contact_vs_support_kind() {
        let now = Utc::now();
        let contact = Message::contact("Amina", "amina@shop.co.ke", "Amina Bakes", "WhatsApp", "Order bot", now);
        assert_eq!(contact.kind(), MessageKind::Contact);

        let support = Message::support("Bot stopped replying", Some(Urgency::High), now);
        assert_eq!(support.kind(), MessageKind::Support);

        let partial = Message::contact("Amina", "", "", "", "hello", now);
        assert_eq!(partial.kind(), MessageKind::Other);
    }

    #[test]
    fn empty_message_rejected() {
        let msg = Message::contact("", "", "", "", "  ", Utc::now());
        assert!(msg.validate().is_err());
    }

    #[test]
    fn bad_email_rejected() {
        let msg = Message::contact("Amina", "not-an-email", "", "", "hi", Utc::now());
        assert!(msg.validate().is_err());
    }

    #[test]
    fn display_name_falls_back() {
        let msg = Message::support("help", None, Utc::now());
        assert_eq!(msg.display_name(), "Anonymous — No email");
    }

    #[test]
    fn filter_combines_status_and_kind() {
        let now = Utc::now();
        let mut support = Message::support("help", Some(Urgency::Low), now);
        support.is_read = true;

        let unread_support = MessageFilter {
            status: ReadStatus::Unread,
            kind: Some(MessageKind::Support),
        };
        assert!(!unread_support.matches(&support));

        let read_any = MessageFilter {
            status: ReadStatus::Read,
            kind: None,
        };
        assert!(read_any.matches(&support));
    }

    #[test]
    fn project_defaults_to_pending() {
        let project = Project::new("Bot for Mama Mboga", None, Utc::now());
        assert_eq!(project.status, "Pending");
        let blank = Project::new("x", Some("  ".to_string()), Utc::now());
        assert_eq!(blank.status, "Pending");
    }

    #[test]
    fn urgency_labels() {
        assert_eq!(Urgency::Medium.label(), "Issue affecting workflow");
    }
}
