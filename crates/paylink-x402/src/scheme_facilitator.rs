use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};

use crate::constants::{SCHEME_EXACT, VALID_AFTER_SKEW_SECS, X402_VERSION};
use crate::eip712::{verify_signature, TransferTypedData, TypedDataDomain};
use crate::nonce_store::{spawn_purge_task, InMemoryNonceStore, NonceStore};
use crate::payment::{parse_decimal_amount, unix_now};
use crate::{Facilitator, NetworkConfig, PaymentPayload, PaymentRequirements, VerifyResponse, X402Error};

/// In-process facilitator: checks the signed authorization against the
/// issued descriptor without touching a chain.
///
/// Settlement is out of scope, so a successful verification consumes the
/// nonce and the same header is never accepted twice.
pub struct LocalFacilitator {
    config: NetworkConfig,
    nonce_store: Arc<dyn NonceStore>,
}

impl LocalFacilitator {
    /// Facilitator for one network with an in-memory nonce store.
    ///
    /// Nonces are lost on restart; use [`with_nonce_store`](Self::with_nonce_store)
    /// with a [`SqliteNonceStore`](crate::nonce_store::SqliteNonceStore) to persist them.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            nonce_store: Arc::new(InMemoryNonceStore::new()),
        }
    }

    pub fn with_nonce_store(mut self, store: Arc<dyn NonceStore>) -> Self {
        self.nonce_store = store;
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn nonce_store(&self) -> Arc<dyn NonceStore> {
        Arc::clone(&self.nonce_store)
    }

    /// Purge this facilitator's nonces older than `max_age` every minute.
    /// Needs a tokio runtime.
    pub fn start_nonce_cleanup(&self, max_age: Duration) -> tokio::task::JoinHandle<()> {
        spawn_purge_task(Arc::clone(&self.nonce_store), max_age)
    }

    pub(crate) fn verify_at(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        now: u64,
    ) -> VerifyResponse {
        if payload.x402_version != X402_VERSION {
            return VerifyResponse::invalid(
                format!(
                    "Unsupported x402 version: {} (expected {X402_VERSION})",
                    payload.x402_version
                ),
                None,
            );
        }

        if requirements.scheme != SCHEME_EXACT || payload.scheme != requirements.scheme {
            return VerifyResponse::invalid(
                format!(
                    "Scheme mismatch: expected '{}', got '{}'",
                    requirements.scheme, payload.scheme
                ),
                None,
            );
        }
        if requirements.network != self.config.network || payload.network != requirements.network
        {
            return VerifyResponse::invalid(
                format!(
                    "Network mismatch: expected '{}', got '{}'",
                    self.config.network, payload.network
                ),
                None,
            );
        }

        if !requirements.asset.eq_ignore_ascii_case(&self.config.asset) {
            return VerifyResponse::invalid(
                format!(
                    "Asset mismatch: expected '{}', got '{}'",
                    self.config.asset, requirements.asset
                ),
                None,
            );
        }

        let auth = payload.authorization();
        let payer = Some(auth.from.clone());

        if self.nonce_store.is_used(&auth.nonce) {
            tracing::warn!(
                nonce = %format!("{:.8}", auth.nonce),
                payer = %auth.from,
                "replayed nonce rejected"
            );
            return VerifyResponse::invalid("Nonce already used", payer);
        }

        if now < auth.valid_after {
            return VerifyResponse::invalid("Authorization not yet valid", payer);
        }
        if now >= auth.valid_before {
            return VerifyResponse::invalid("Authorization expired", payer);
        }
        let max_window = requirements
            .max_timeout_seconds
            .saturating_add(VALID_AFTER_SKEW_SECS);
        let window = auth.valid_before.saturating_sub(auth.valid_after);
        if window > max_window {
            return VerifyResponse::invalid(
                format!("Validity window too large: {window}s exceeds max {max_window}s"),
                payer,
            );
        }

        if !auth.to.eq_ignore_ascii_case(&requirements.pay_to) {
            return VerifyResponse::invalid("Recipient mismatch", payer);
        }

        let value = match parse_decimal_amount(&auth.value) {
            Ok(v) => v,
            Err(e) => return VerifyResponse::invalid(format!("Invalid value: {e}"), payer),
        };
        let required = match requirements.max_amount() {
            Ok(v) => v,
            Err(e) => return VerifyResponse::invalid(e.to_string(), payer),
        };
        if value.is_zero() {
            return VerifyResponse::invalid("Payment value must be non-zero", payer);
        }
        if value < required {
            return VerifyResponse::invalid("Payment amount below required", payer);
        }
        if value > required {
            return VerifyResponse::invalid("Payment amount above required", payer);
        }

        let from = match auth.from.parse::<Address>() {
            Ok(a) => a,
            Err(_) => return VerifyResponse::invalid("Payer is not an address", payer),
        };

        // Domain comes from the issued descriptor, never from the header.
        let typed = TransferTypedData::new(
            TypedDataDomain::for_requirements(requirements, self.config.chain_id),
            auth.clone(),
        );
        match verify_signature(&typed, &payload.payload.signature) {
            Ok(recovered) if recovered == from => {}
            Ok(_) => return VerifyResponse::invalid("Invalid signature", payer),
            Err(e) => return VerifyResponse::invalid(format!("Invalid signature: {e}"), payer),
        }

        if !self.nonce_store.try_use(auth.nonce) {
            return VerifyResponse::invalid("Nonce already used", payer);
        }

        tracing::info!(
            payer = %auth.from,
            value = %auth.value,
            network = %payload.network,
            "payment verified"
        );
        VerifyResponse::valid(auth.from.clone())
    }
}

impl Facilitator for LocalFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, X402Error> {
        Ok(self.verify_at(payload, requirements, unix_now()?))
    }

    fn release(&self, nonce: &B256) {
        self.nonce_store.release(nonce);
    }
}
