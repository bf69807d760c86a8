//! # Tools Directory
//!
//! The "tools we use" list shown on the customer dashboard.

use crate::primitives::{
    MAX_TEXT_LENGTH, MAX_TOOL_ICON_LENGTH, MAX_TOOL_NAME_LENGTH, MAX_TOOL_SLUG_LENGTH,
    MAX_URL_LENGTH,
};
use crate::validate::{max_length, optional_url, required, slug};
use crate::TwainError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub id: u64,
    pub name: String,
    pub slug: String,
    /// Short description of the tool.
    pub description: String,
    /// Optional icon class (e.g. `bi-whatsapp`).
    pub icon: String,
    /// Official website or documentation link.
    pub website_url: String,
    pub sort_order: u32,
    pub is_active: bool,
}

impl Tool {
    pub fn validate(&self) -> Result<(), TwainError> {
        required("Name", &self.name, MAX_TOOL_NAME_LENGTH)?;
        slug("Slug", &self.slug, MAX_TOOL_SLUG_LENGTH)?;
        max_length("Description", &self.description, MAX_TEXT_LENGTH)?;
        max_length("Icon", &self.icon, MAX_TOOL_ICON_LENGTH)?;
        optional_url("Website URL", &self.website_url, MAX_URL_LENGTH)
    }

    /// Display order: `sort_order`, then name.
    pub fn display_order(a: &Self, b: &Self) -> Ordering {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.name.cmp(&b.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, sort_order: u32) -> Tool {
        Tool {
            id: 0,
            name: name.to_string(),
            slug: crate::slugify(name),
            description: String::new(),
            icon: String::new(),
            website_url: String::new(),
            sort_order,
            is_active: true,
        }
    }

    #[test]
    fn ordering_by_sort_then_name() {
        let mut tools = vec![
            tool("Canva", 1),
            tool("Zapier", 0),
            tool("Airtable", 0),
            tool("ManyChat", 0),
        ];
        tools.sort_by(Tool::display_order);
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Airtable", "ManyChat", "Zapier", "Canva"]);
    }

    #[test]
    fn website_must_be_http() {
        let mut t = tool("Zapier", 0);
        t.website_url = "zapier.com".to_string();
        assert!(t.validate().is_err());
        t.website_url = "https://zapier.com".to_string();
        assert!(t.validate().is_ok());
    }
}
