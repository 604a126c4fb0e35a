//! Client for a remote facilitator's `/verify` endpoint.

use std::time::Duration;

use crate::hmac::{compute_hmac, FACILITATOR_AUTH_HEADER};
use crate::{Facilitator, PaymentPayload, PaymentRequirements, VerifyResponse, X402Error, X402_VERSION};

/// Remote facilitator over HTTP.
///
/// Any failure to obtain a well-formed verdict is
/// [`X402Error::FacilitatorUnavailable`]; callers must treat it as a
/// rejection.
#[derive(Clone)]
pub struct HttpFacilitator {
    client: reqwest::Client,
    base_url: String,
    hmac_secret: Option<Vec<u8>>,
    timeout: Duration,
}

impl HttpFacilitator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            hmac_secret: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sign every request body with HMAC-SHA256 under `secret`.
    pub fn with_hmac_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.hmac_secret = Some(secret.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn verify_url(&self) -> String {
        format!("{}/verify", self.base_url)
    }
}

impl std::fmt::Debug for HttpFacilitator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFacilitator")
            .field("base_url", &self.base_url)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Facilitator for HttpFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, X402Error> {
        let body = serde_json::json!({
            "x402Version": X402_VERSION,
            "paymentPayload": payload,
            "paymentRequirements": requirements,
        });
        let body_bytes = serde_json::to_vec(&body)?;

        let mut request = self
            .client
            .post(self.verify_url())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(self.timeout);
        if let Some(secret) = &self.hmac_secret {
            request = request.header(FACILITATOR_AUTH_HEADER, compute_hmac(secret, &body_bytes));
        }

        let resp = request.body(body_bytes).send().await.map_err(|e| {
            X402Error::FacilitatorUnavailable(format!("facilitator request failed: {e}"))
        })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(X402Error::FacilitatorUnavailable(
                "facilitator authentication failed".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(X402Error::FacilitatorUnavailable(format!(
                "facilitator returned {status}"
            )));
        }

        let verdict = resp.json::<VerifyResponse>().await.map_err(|e| {
            X402Error::FacilitatorUnavailable(format!("facilitator response parse failed: {e}"))
        })?;
        tracing::debug!(
            is_valid = verdict.is_valid,
            reason = ?verdict.invalid_reason,
            "facilitator verdict"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_url_strips_trailing_slash() {
        let f = HttpFacilitator::new("https://x402.org/facilitator/");
        assert_eq!(f.verify_url(), "https://x402.org/facilitator/verify");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let f = HttpFacilitator::new("http://localhost:4022").with_hmac_secret("hunter2");
        let out = format!("{f:?}");
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("hunter2"));
    }
}
