//! Payment header codec: `PaymentPayload` <-> base64(JSON) token.
//!
//! Decode failures are always [`X402Error::MalformedHeader`], which callers
//! must keep apart from verification failures: a token that does not decode
//! is never forwarded to a facilitator.

use base64::Engine;

use crate::{PaymentPayload, X402Error};

const REQUIRED_FIELDS: [&str; 4] = ["x402Version", "scheme", "network", "payload"];

/// Base64-encode a payment payload for the `X-PAYMENT` header.
pub fn encode_payment(payload: &PaymentPayload) -> Result<String, X402Error> {
    let json = serde_json::to_vec(payload)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Decode and structurally validate an `X-PAYMENT` header value.
pub fn decode_payment(encoded: &str) -> Result<PaymentPayload, X402Error> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| X402Error::MalformedHeader(format!("invalid base64: {e}")))?;

    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| X402Error::MalformedHeader(format!("invalid JSON: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| X402Error::MalformedHeader("header is not a JSON object".to_string()))?;
    for field in REQUIRED_FIELDS {
        match object.get(field) {
            None | Some(serde_json::Value::Null) => {
                return Err(X402Error::MalformedHeader(format!("missing field `{field}`")))
            }
            Some(_) => {}
        }
    }

    serde_json::from_value(value)
        .map_err(|e| X402Error::MalformedHeader(format!("invalid payload: {e}")))
}
