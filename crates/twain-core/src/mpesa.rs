//! # M-Pesa Wire Types
//!
//! Daraja "Lipa na M-Pesa Online" (STK Push) request, response and callback
//! payloads, plus the password/timestamp derivation. No I/O happens here;
//! the HTTP client lives in the app crate.
//!
//! Field names follow Daraja's JSON exactly (PascalCase, with the odd
//! `stkCallback` and `CallBackURL` spellings).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::Timestamp;
use crate::primitives::STK_SUCCESS_CODE;

/// Transaction type for paybill STK pushes.
pub const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

/// East Africa Time offset in seconds (UTC+3).
const EAT_OFFSET_SECS: i32 = 3 * 3600;

// =============================================================================
// STK PUSH
// =============================================================================

/// Body of `POST /mpesa/stkpush/v1/processrequest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: u64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

impl StkPushRequest {
    /// Build a paybill push where the customer's phone is both payer and
    /// notification target.
    #[allow(clippy::too_many_arguments)]
    pub fn paybill(
        shortcode: &str,
        passkey: &str,
        now: Timestamp,
        phone: &str,
        amount: u64,
        callback_url: &str,
        reference: &str,
        description: &str,
    ) -> Self {
        let timestamp = stk_timestamp(now);
        Self {
            business_short_code: shortcode.to_string(),
            password: stk_password(shortcode, passkey, &timestamp),
            timestamp,
            transaction_type: TRANSACTION_TYPE.to_string(),
            amount,
            party_a: phone.to_string(),
            party_b: shortcode.to_string(),
            phone_number: phone.to_string(),
            callback_url: callback_url.to_string(),
            account_reference: reference.to_string(),
            transaction_desc: description.to_string(),
        }
    }
}

/// Synchronous acknowledgement of an STK push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

impl StkPushResponse {
    /// Daraja accepted the request for processing.
    pub fn is_accepted(&self) -> bool {
        self.response_code.trim() == "0"
    }
}

/// `YYYYMMDDHHMMSS` in East Africa Time.
pub fn stk_timestamp(now: Timestamp) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECS) {
        Some(eat) => now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
        None => now.format("%Y%m%d%H%M%S").to_string(),
    }
}

/// `base64(shortcode + passkey + timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{shortcode}{passkey}{timestamp}"))
}

// =============================================================================
// CALLBACK
// =============================================================================

/// Outer callback payload: `{"Body": {"stkCallback": {...}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

/// Asynchronous STK result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<MetadataValue>,
}

/// Metadata values arrive as numbers or strings depending on the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    fn as_text(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl StkCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == STK_SUCCESS_CODE
    }

    fn item(&self, name: &str) -> Option<&MetadataValue> {
        self.metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    /// `MpesaReceiptNumber`, when present.
    pub fn receipt_number(&self) -> Option<String> {
        self.item("MpesaReceiptNumber").map(MetadataValue::as_text)
    }

    /// `Amount` in whole shillings, when present and integral.
    pub fn amount(&self) -> Option<u64> {
        match self.item("Amount")? {
            MetadataValue::Int(i) => u64::try_from(*i).ok(),
            MetadataValue::Float(_) => None,
            MetadataValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// The acknowledgement Daraja expects back from the callback URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
