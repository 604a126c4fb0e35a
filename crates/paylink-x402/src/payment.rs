use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EIP712_NAME, DEFAULT_EIP712_VERSION};
use crate::X402Error;

/// A single entry in the `accepts` array of a 402 response: the terms a
/// client must satisfy. Field names are fixed by the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    /// Atomic units of `asset`, as a decimal string.
    pub max_amount_required: String,
    /// Canonical URL of the protected action.
    pub resource: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
    /// Scheme-specific metadata, e.g. `{"name": "USD Coin", "version": "2"}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PaymentRequirements {
    /// Structural validation beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), X402Error> {
        let required = [
            ("scheme", &self.scheme),
            ("network", &self.network),
            ("asset", &self.asset),
            ("payTo", &self.pay_to),
            ("resource", &self.resource),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(X402Error::InvalidRequirements(format!("{name} is empty")));
            }
        }
        self.max_amount()?;
        if self.max_timeout_seconds == 0 {
            return Err(X402Error::InvalidRequirements(
                "maxTimeoutSeconds must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `maxAmountRequired` as an integer.
    pub fn max_amount(&self) -> Result<U256, X402Error> {
        parse_decimal_amount(&self.max_amount_required).map_err(|e| {
            X402Error::InvalidRequirements(format!("maxAmountRequired: {e}"))
        })
    }

    /// EIP-712 domain name from `extra.name`, defaulting to USDC's.
    pub fn eip712_name(&self) -> String {
        self.extra_str("name")
            .unwrap_or(DEFAULT_EIP712_NAME)
            .to_string()
    }

    /// EIP-712 domain version from `extra.version`, defaulting to USDC's.
    pub fn eip712_version(&self) -> String {
        self.extra_str("version")
            .unwrap_or(DEFAULT_EIP712_VERSION)
            .to_string()
    }

    fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra
            .as_ref()
            .and_then(|extra| extra.get(key))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Parse a non-empty string of ASCII digits into a `U256`.
///
/// Unlike `U256::from_str`, this rejects `0x` hex, signs and whitespace.
pub fn parse_decimal_amount(value: &str) -> Result<U256, String> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{value}' is not a decimal integer"));
    }
    U256::from_str_radix(value, 10).map_err(|e| format!("'{value}': {e}"))
}

/// The 402 response body returned by the resource server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    pub x402_version: u32,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default)]
    pub error: String,
}

/// The signed message: a time-bounded transfer of `value` from `from` to `to`.
///
/// Integer fields travel as decimal strings so no JSON parser can round them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAuthorization {
    pub from: String,
    pub to: String,
    pub value: String,
    #[serde(with = "u64_string")]
    pub valid_after: u64,
    #[serde(with = "u64_string")]
    pub valid_before: u64,
    pub nonce: B256,
}

/// Payload of the `exact` scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactPayload {
    /// 0x-prefixed 65-byte signature.
    pub signature: String,
    pub authorization: TransferAuthorization,
}

/// Wire-format payment header (sent in `X-PAYMENT`, base64-encoded JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    pub payload: ExactPayload,
}

impl PaymentPayload {
    pub fn authorization(&self) -> &TransferAuthorization {
        &self.payload.authorization
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, X402Error> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| X402Error::ConfigError(format!("system time error: {e}")))
}

/// Serde adapter for `u64` carried as a decimal string. Bare JSON numbers
/// are accepted on input for leniency towards other implementations.
mod u64_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Num(u64),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Num(n) => Ok(n),
            Repr::Str(s) => {
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(de::Error::custom(format!("'{s}' is not a decimal integer")));
                }
                s.parse::<u64>().map_err(de::Error::custom)
            }
        }
    }
}
