use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::X402Error;

/// Response from a facilitator's `/verify` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl VerifyResponse {
    pub fn valid(payer: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            payer: Some(payer.into()),
        }
    }

    pub fn invalid(reason: impl Into<String>, payer: Option<String>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            payer,
        }
    }
}

/// Payment confirmation carried in `X-PAYMENT-RESPONSE` on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub success: bool,
    /// Settlement reference. Without on-chain settlement this is the
    /// authorization nonce.
    #[serde(default)]
    pub transaction: Option<String>,
    pub network: String,
    #[serde(default)]
    pub payer: Option<String>,
}

impl PaymentResponse {
    /// Base64-encoded JSON, the form placed in the response header.
    pub fn encode(&self) -> Result<String, X402Error> {
        let json = serde_json::to_vec(self)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }

    /// Decode a header value. Servers disagree on whether to base64 the
    /// JSON, so plain JSON is accepted as a fallback.
    pub fn decode(value: &str) -> Result<Self, X402Error> {
        let value = value.trim();
        if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(value) {
            if let Ok(parsed) = serde_json::from_slice::<PaymentResponse>(&bytes) {
                return Ok(parsed);
            }
        }
        serde_json::from_str::<PaymentResponse>(value).map_err(|e| {
            X402Error::MalformedHeader(format!("payment response is neither base64 nor JSON: {e}"))
        })
    }
}
