//! # Daraja Gateway
//!
//! STK Push initiation against Safaricom's Daraja API.
//!
//! Handlers only see the [`StkGateway`] trait, so tests can swap in a fake.
//! [`DarajaClient`] is the real implementation:
//!
//! 1. `GET /oauth/v1/generate?grant_type=client_credentials` (basic auth)
//!    yields a bearer token, cached until a minute before it expires.
//! 2. `POST /mpesa/stkpush/v1/processrequest` sends the push.
//!
//! A 401 from Daraja drops the cached token so the next call re-authenticates.
//! Nothing is retried.

use crate::config::MpesaConfig;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use twain_core::mpesa::{StkPushRequest, StkPushResponse};

/// Seconds shaved off the token lifetime before it is considered stale.
const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

/// Upper bound on any single Daraja call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// ERRORS
// =============================================================================

/// Errors from the payment gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Cannot reach Daraja.
    #[error("Cannot reach M-Pesa: {0}")]
    ConnectionFailed(String),
    /// Daraja rejected our credentials or token.
    #[error("M-Pesa rejected the API credentials")]
    Unauthorized,
    /// Daraja answered but refused the request.
    #[error("M-Pesa rejected the request: {0}")]
    Rejected(String),
    /// Daraja's response could not be parsed.
    #[error("Unexpected M-Pesa response: {0}")]
    ParseError(String),
}

// =============================================================================
// GATEWAY TRAIT
// =============================================================================

/// Something that can start an STK Push.
#[async_trait]
pub trait StkGateway: Send + Sync {
    /// Prompt `phone` (normalized `2547XXXXXXXX`) to pay `amount_kes`.
    async fn stk_push(
        &self,
        phone: &str,
        amount_kes: u64,
        reference: &str,
        description: &str,
    ) -> Result<StkPushResponse, GatewayError>;
}

// =============================================================================
// DARAJA CLIENT
// =============================================================================

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Daraja sends this as a string ("3599"); accept numbers too.
    expires_in: serde_json::Value,
}

impl TokenResponse {
    fn lifetime_secs(&self) -> u64 {
        match &self.expires_in {
            serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
            serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Error body Daraja returns on 4xx/5xx.
#[derive(Deserialize)]
struct DarajaFault {
    #[serde(rename = "errorMessage", default)]
    error_message: String,
}

/// HTTP client for Daraja.
pub struct DarajaClient {
    http: reqwest::Client,
    config: MpesaConfig,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for DarajaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarajaClient")
            .field("environment", &self.config.environment)
            .field("shortcode", &self.config.shortcode)
            .finish_non_exhaustive()
    }
}

impl DarajaClient {
    pub fn new(config: MpesaConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// A valid OAuth token, fetched only when the cache is empty or stale.
    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let resp = self
            .http
            .get(self.url("/oauth/v1/generate"))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| GatewayError::ConnectionFailed(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::BAD_REQUEST
        {
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("OAuth {status}: {body}")));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::ParseError(e.to_string()))?;
        let ttl = token.lifetime_secs().saturating_sub(TOKEN_REFRESH_MARGIN_SECS);
        tracing::debug!(event = "mpesa_token", ttl_secs = ttl, "Fetched Daraja access token");

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        Ok(value)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }
}

#[async_trait]
impl StkGateway for DarajaClient {
    async fn stk_push(
        &self,
        phone: &str,
        amount_kes: u64,
        reference: &str,
        description: &str,
    ) -> Result<StkPushResponse, GatewayError> {
        let token = self.access_token().await?;
        let request = StkPushRequest::paybill(
            &self.config.shortcode,
            &self.config.passkey,
            Utc::now(),
            phone,
            amount_kes,
            &self.config.callback_url,
            reference,
            description,
        );

        let resp = self
            .http
            .post(self.url("/mpesa/stkpush/v1/processrequest"))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::ConnectionFailed(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.forget_token().await;
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<DarajaFault>(&body)
                .map(|fault| fault.error_message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            return Err(GatewayError::Rejected(format!("{status}: {detail}")));
        }

        let parsed: StkPushResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::ParseError(e.to_string()))?;
        if !parsed.is_accepted() {
            return Err(GatewayError::Rejected(parsed.response_description));
        }
        Ok(parsed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
