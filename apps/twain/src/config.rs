//! # Configuration
//!
//! Twain reads an optional TOML file (`--config twain.toml`) and then applies
//! `TWAIN_*` environment overrides. Every key has a default, so an empty or
//! missing file yields a working local setup with M-Pesa disabled.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! cors_origins = "https://twain.co.ke"
//! rate_limit = 100
//!
//! [auth]
//! session_ttl_hours = 336
//!
//! [mpesa]
//! environment = "sandbox"
//! consumer_key = "..."
//! consumer_secret = "..."
//! shortcode = "174379"
//! passkey = "..."
//! callback_url = "https://twain.co.ke/payments/callback"
//! callback_token = "..."
//! ```
//!
//! ## Environment Variables
//!
//! - `TWAIN_CORS_ORIGINS`: comma-separated origins, or `*` for all
//! - `TWAIN_RATE_LIMIT`: requests per second (`0` disables)
//! - `TWAIN_SESSION_TTL_HOURS`: login lifetime
//! - `TWAIN_MPESA_ENVIRONMENT`, `TWAIN_MPESA_CONSUMER_KEY`,
//!   `TWAIN_MPESA_CONSUMER_SECRET`, `TWAIN_MPESA_SHORTCODE`,
//!   `TWAIN_MPESA_PASSKEY`, `TWAIN_MPESA_CALLBACK_URL`,
//!   `TWAIN_MPESA_CALLBACK_TOKEN`, `TWAIN_MPESA_BASE_URL`

use serde::Deserialize;
use std::path::Path;
use twain_core::TwainError;
use twain_core::primitives::{DEFAULT_SESSION_TTL_HOURS, MAX_SESSION_TTL_HOURS};

/// Default rate limit: 100 requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// SECTIONS
// =============================================================================

/// Full application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub mpesa: MpesaSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `None` means localhost only.
    pub cors_origins: Option<String>,
    pub rate_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: None,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }
}

/// Daraja environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MpesaEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.safaricom.co.ke",
            Self::Production => "https://api.safaricom.co.ke",
        }
    }

    fn parse(raw: &str) -> Result<Self, TwainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(TwainError::validation(format!(
                "Unknown M-Pesa environment '{other}' (expected sandbox or production)"
            ))),
        }
    }
}

/// `[mpesa]` as written: every credential optional until resolved.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MpesaSection {
    pub environment: MpesaEnvironment,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub shortcode: Option<String>,
    pub passkey: Option<String>,
    pub callback_url: Option<String>,
    /// Shared secret the callback URL must carry as `?token=`.
    pub callback_token: Option<String>,
    pub account_reference: Option<String>,
    /// Replaces the environment's Daraja host, e.g. for a local stand-in.
    pub base_url: Option<String>,
}

/// Complete Daraja credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpesaConfig {
    pub environment: MpesaEnvironment,
    /// Daraja host without a trailing slash.
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
    pub account_reference: String,
}

// =============================================================================
// LOADING
// =============================================================================

impl AppConfig {
    /// Load from an optional TOML file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, TwainError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    TwainError::Storage(format!("Cannot read config {}: {e}", path.display()))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, TwainError> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| TwainError::validation(format!("Invalid config: {e}")))?;
        config.check_bounds()?;
        Ok(config)
    }

    fn check_bounds(&self) -> Result<(), TwainError> {
        let hours = self.auth.session_ttl_hours;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
            return Err(TwainError::validation(format!(
                "session_ttl_hours must be between 1 and {MAX_SESSION_TTL_HOURS}, got {hours}"
            )));
        }
        Ok(())
    }

    /// Apply `TWAIN_*` overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), TwainError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(origins) = var("TWAIN_CORS_ORIGINS") {
            self.server.cors_origins = Some(origins);
        }
        if let Some(raw) = var("TWAIN_RATE_LIMIT") {
            self.server.rate_limit = raw.trim().parse().map_err(|_| {
                TwainError::validation(format!("TWAIN_RATE_LIMIT must be a number, got '{raw}'"))
            })?;
        }
        if let Some(raw) = var("TWAIN_SESSION_TTL_HOURS") {
            self.auth.session_ttl_hours = raw.trim().parse().map_err(|_| {
                TwainError::validation(format!(
                    "TWAIN_SESSION_TTL_HOURS must be a number, got '{raw}'"
                ))
            })?;
        }

        let mpesa = &mut self.mpesa;
        if let Some(raw) = var("TWAIN_MPESA_ENVIRONMENT") {
            mpesa.environment = MpesaEnvironment::parse(&raw)?;
        }
        for (key, slot) in [
            ("TWAIN_MPESA_CONSUMER_KEY", &mut mpesa.consumer_key),
            ("TWAIN_MPESA_CONSUMER_SECRET", &mut mpesa.consumer_secret),
            ("TWAIN_MPESA_SHORTCODE", &mut mpesa.shortcode),
            ("TWAIN_MPESA_PASSKEY", &mut mpesa.passkey),
            ("TWAIN_MPESA_CALLBACK_URL", &mut mpesa.callback_url),
            ("TWAIN_MPESA_CALLBACK_TOKEN", &mut mpesa.callback_token),
            ("TWAIN_MPESA_BASE_URL", &mut mpesa.base_url),
        ] {
            if let Some(value) = var(key) {
                *slot = Some(value);
            }
        }
        self.check_bounds()
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.auth.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS))
    }

    /// The callback shared secret, if one is configured.
    pub fn callback_token(&self) -> Option<&str> {
        self.mpesa
            .callback_token
            .as_deref()
            .filter(|t| !t.is_empty())
    }

    /// Resolve Daraja credentials.
    ///
    /// `Ok(None)` when no credential is set at all; an error when only some are.
    pub fn mpesa(&self) -> Result<Option<MpesaConfig>, TwainError> {
        let section = &self.mpesa;
        let fields = [
            ("consumer_key", &section.consumer_key),
            ("consumer_secret", &section.consumer_secret),
            ("shortcode", &section.shortcode),
            ("passkey", &section.passkey),
            ("callback_url", &section.callback_url),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.as_deref().is_none_or(str::is_empty))
            .map(|(name, _)| *name)
            .collect();

        if missing.len() == fields.len() {
            return Ok(None);
        }
        if !missing.is_empty() {
            return Err(TwainError::validation(format!(
                "Incomplete M-Pesa configuration, missing: {}",
                missing.join(", ")
            )));
        }

        let take = |v: &Option<String>| v.clone().unwrap_or_default();
        let base_url = section
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(section.environment.base_url())
            .trim_end_matches('/')
            .to_string();
        Ok(Some(MpesaConfig {
            environment: section.environment,
            base_url,
            consumer_key: take(&section.consumer_key),
            consumer_secret: take(&section.consumer_secret),
            shortcode: take(&section.shortcode),
            passkey: take(&section.passkey),
            callback_url: take(&section.callback_url),
            account_reference: section
                .account_reference
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "Twain".to_string()),
        }))
    }
}

// =============================================================================
// TESTS
// =============================================================================
