//! # Fixed Limits
//!
//! Column widths, defaults and payment bounds compiled into the binary.
//!
//! Lengths are counted in characters, matching the column widths the
//! dashboard has always used for these fields.

// =============================================================================
// ACCOUNTS
// =============================================================================

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 150;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Minimum password length accepted at signup.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Raw session token size in bytes (before base64url encoding).
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Default lifetime of an auth session.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 14;

/// Longest configurable session lifetime (ten years).
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

// =============================================================================
// CONTENT
// =============================================================================

pub const MAX_MESSAGE_NAME_LENGTH: usize = 150;
pub const MAX_BUSINESS_NAME_LENGTH: usize = 200;
pub const MAX_PLATFORM_LENGTH: usize = 50;
pub const MAX_SERVICE_TITLE_LENGTH: usize = 150;
pub const MAX_CLIENT_NAME_LENGTH: usize = 100;
pub const MAX_PROJECT_NAME_LENGTH: usize = 150;
pub const MAX_RECORD_NAME_LENGTH: usize = 255;
pub const MAX_STATUS_LENGTH: usize = 50;

/// Maximum length of any free-text body (descriptions, article content).
///
/// Requests larger than this are rejected before they reach the store.
pub const MAX_TEXT_LENGTH: usize = 100_000;

/// Default project status for newly created projects.
pub const DEFAULT_PROJECT_STATUS: &str = "Pending";

// =============================================================================
// KNOWLEDGE CENTRE & TOOLS
// =============================================================================

pub const MAX_CATEGORY_NAME_LENGTH: usize = 100;
pub const MAX_CATEGORY_SLUG_LENGTH: usize = 120;
pub const MAX_ARTICLE_TITLE_LENGTH: usize = 200;
pub const MAX_ARTICLE_SLUG_LENGTH: usize = 220;
pub const MAX_ATTACHMENT_NAME_LENGTH: usize = 200;
pub const MAX_TOOL_NAME_LENGTH: usize = 100;
pub const MAX_TOOL_SLUG_LENGTH: usize = 120;
pub const MAX_TOOL_ICON_LENGTH: usize = 50;
pub const MAX_URL_LENGTH: usize = 200;

/// Read time shown on an article when none is given.
pub const DEFAULT_READ_TIME_MINUTES: u32 = 5;

/// Number of rows shown in the admin "recent" panels.
pub const RECENT_ITEMS: usize = 5;

// =============================================================================
// BILLING
// =============================================================================

pub const MAX_PLAN_NAME_LENGTH: usize = 100;
pub const MAX_PLAN_SLUG_LENGTH: usize = 120;
pub const MAX_PLAN_BADGE_LENGTH: usize = 50;

/// Prefix every accepted Safaricom MSISDN starts with.
pub const PHONE_PREFIX: &str = "2547";

/// Length of a normalized MSISDN (`2547XXXXXXXX`).
pub const PHONE_LENGTH: usize = 12;

/// Smallest STK Push amount in KES.
pub const MIN_STK_AMOUNT_KES: u64 = 1;

/// Largest single STK Push amount in KES.
pub const MAX_STK_AMOUNT_KES: u64 = 250_000;

/// Daraja result code for a completed payment.
pub const STK_SUCCESS_CODE: i64 = 0;
