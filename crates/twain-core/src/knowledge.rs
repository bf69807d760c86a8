//! # Knowledge Centre
//!
//! Categories, articles and article attachments shown in the customer
//! dashboard. Media fields (`feature_image`, `video_file`, attachment
//! `file`) hold references (paths or URLs); the bytes live elsewhere.

use crate::primitives::{
    DEFAULT_READ_TIME_MINUTES, MAX_ARTICLE_SLUG_LENGTH, MAX_ARTICLE_TITLE_LENGTH,
    MAX_ATTACHMENT_NAME_LENGTH, MAX_CATEGORY_NAME_LENGTH, MAX_CATEGORY_SLUG_LENGTH,
    MAX_TEXT_LENGTH, MAX_URL_LENGTH,
};
use crate::validate::{max_length, optional_url, required, slug};
use crate::{Timestamp, TwainError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// =============================================================================
// CATEGORY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeCategory {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub sort_order: u32,
    pub is_active: bool,
}

impl KnowledgeCategory {
    pub fn validate(&self) -> Result<(), TwainError> {
        required("Name", &self.name, MAX_CATEGORY_NAME_LENGTH)?;
        slug("Slug", &self.slug, MAX_CATEGORY_SLUG_LENGTH)?;
        max_length("Description", &self.description, MAX_TEXT_LENGTH)
    }

    /// Display order: `sort_order`, then name.
    pub fn display_order(a: &Self, b: &Self) -> Ordering {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.name.cmp(&b.name))
    }
}

// =============================================================================
// ARTICLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeArticle {
    pub id: u64,
    // Core
    pub title: String,
    pub slug: String,
    pub category_id: Option<u64>,
    /// Short intro shown in cards.
    pub summary: String,
    /// Full documentation body (Markdown or HTML).
    pub content: String,
    // Display and metadata
    pub read_time_minutes: u32,
    pub featured: bool,
    pub is_published: bool,
    pub sort_order: u32,
    // Media
    pub feature_image: Option<String>,
    pub video_url: String,
    pub video_file: Option<String>,
    // Audit
    pub author_id: Option<u64>,
    pub published_at: Timestamp,
    pub updated_at: Timestamp,
}

impl KnowledgeArticle {
    /// A published, unfeatured article with default read time.
    pub fn new(
        title: impl Into<String>,
        slug: impl Into<String>,
        content: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: 0,
            title: title.into(),
            slug: slug.into(),
            category_id: None,
            summary: String::new(),
            content: content.into(),
            read_time_minutes: DEFAULT_READ_TIME_MINUTES,
            featured: false,
            is_published: true,
            sort_order: 0,
            feature_image: None,
            video_url: String::new(),
            video_file: None,
            author_id: None,
            published_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), TwainError> {
        required("Title", &self.title, MAX_ARTICLE_TITLE_LENGTH)?;
        slug("Slug", &self.slug, MAX_ARTICLE_SLUG_LENGTH)?;
        max_length("Summary", &self.summary, MAX_TEXT_LENGTH)?;
        required("Content", &self.content, MAX_TEXT_LENGTH)?;
        optional_url("Video URL", &self.video_url, MAX_URL_LENGTH)
    }

    /// Display order: `sort_order`, then newest first.
    pub fn display_order(a: &Self, b: &Self) -> Ordering {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| b.published_at.cmp(&a.published_at))
    }

    /// Embeddable player URL for the article's video link.
    ///
    /// YouTube watch/share links become `/embed/` links and Vimeo page links
    /// become player links. Anything else is returned as-is (trimmed).
    pub fn video_embed_url(&self) -> String {
        let url = self.video_url.trim();
        if url.is_empty() {
            return String::new();
        }

        if url.contains("youtube.com/watch") {
            let vid = url
                .split_once('?')
                .map(|(_, query)| query_param(query, "v"))
                .unwrap_or_default();
            return format!("https://www.youtube.com/embed/{vid}");
        }
        if let Some((_, rest)) = url.split_once("youtu.be/") {
            let vid = rest.split('?').next().unwrap_or_default();
            return format!("https://www.youtube.com/embed/{vid}");
        }
        if url.contains("vimeo.com/") {
            let vid = url.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
            return format!("https://player.vimeo.com/video/{vid}");
        }

        url.to_string()
    }
}

/// First value of `key` in a query string (no percent-decoding needed for video ids).
fn query_param<'a>(query: &'a str, key: &str) -> &'a str {
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
        .unwrap_or_default()
}

// =============================================================================
// ATTACHMENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeAttachment {
    pub id: u64,
    pub article_id: u64,
    pub name: String,
    /// Path or URL of the stored file.
    pub file: String,
    pub sort_order: u32,
}

impl KnowledgeAttachment {
    pub fn validate(&self) -> Result<(), TwainError> {
        required("Name", &self.name, MAX_ATTACHMENT_NAME_LENGTH)?;
        required("File", &self.file, MAX_TEXT_LENGTH)
    }

    /// Display order: `sort_order`, then name.
    pub fn display_order(a: &Self, b: &Self) -> Ordering {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.name.cmp(&b.name))
    }
}

// =============================================================================
// TESTS
// =============================================================================
