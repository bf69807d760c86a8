//! # Field Validation
//!
//! Small, reusable checks shared by every record's `validate()`.
//! Messages are user-facing and name the offending field.

use crate::TwainError;

/// Reject empty (after trim) or over-long text.
pub fn required(field: &str, value: &str, max_chars: usize) -> Result<(), TwainError> {
    if value.trim().is_empty() {
        return Err(TwainError::validation(format!("{field} is required")));
    }
    max_length(field, value, max_chars)
}

/// Reject text longer than `max_chars` characters. Empty is allowed.
pub fn max_length(field: &str, value: &str, max_chars: usize) -> Result<(), TwainError> {
    let len = value.chars().count();
    if len > max_chars {
        return Err(TwainError::validation(format!(
            "{field} must be at most {max_chars} characters (got {len})"
        )));
    }
    Ok(())
}

/// Plausible email check: one `@`, non-empty local part, dotted domain.
pub fn is_plausible_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// Optional email: empty passes, anything else must look like an address.
pub fn optional_email(field: &str, value: &str) -> Result<(), TwainError> {
    if value.is_empty() || is_plausible_email(value) {
        Ok(())
    } else {
        Err(TwainError::validation(format!(
            "{field} must be a valid email address"
        )))
    }
}

/// Optional URL: empty passes, anything else must be http(s) with a host.
pub fn optional_url(field: &str, value: &str, max_chars: usize) -> Result<(), TwainError> {
    if value.is_empty() {
        return Ok(());
    }
    max_length(field, value, max_chars)?;
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => Err(TwainError::validation(format!(
            "{field} must be an http(s) URL"
        ))),
    }
}

/// Slugs are lowercase ASCII alphanumerics separated by single hyphens.
pub fn slug(field: &str, value: &str, max_chars: usize) -> Result<(), TwainError> {
    required(field, value, max_chars)?;
    if slugify(value) != value {
        return Err(TwainError::validation(format!(
            "{field} may only contain lowercase letters, digits and single hyphens"
        )));
    }
    Ok(())
}

/// Turn a display name into a URL slug.
///
/// `"Getting Started: WhatsApp Bots!"` becomes `"getting-started-whatsapp-bots"`.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Use `slug` if given, otherwise derive one from `source`.
pub fn slug_or_derive(slug: &str, source: &str) -> String {
    let trimmed = slug.trim();
    if trimmed.is_empty() {
        slugify(source)
    } else {
        trimmed.to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================
