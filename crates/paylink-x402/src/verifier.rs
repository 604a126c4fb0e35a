//! Server-side boundary between an inbound `X-PAYMENT` header and the facilitator.
//!
//! Order of checks:
//! 1. decode the header (format errors stop here and never reach the facilitator)
//! 2. scheme/network must echo the issued descriptor
//! 3. local replay check
//! 4. facilitator verdict against the *issued* descriptor, failing closed
//! 5. atomic nonce claim, so two concurrent requests with one header cannot both pass

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::B256;

use crate::header::decode_payment;
use crate::nonce_store::{spawn_purge_task, InMemoryNonceStore, NonceStore};
use crate::{Facilitator, PaymentPayload, PaymentRequirements, PaymentResponse, X402Error};

/// A payment the facilitator accepted, with the fields persisted alongside
/// the action's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    /// The header exactly as received.
    pub raw_header: String,
    pub payload: PaymentPayload,
    pub payer: String,
    pub receiver: String,
    pub amount: String,
    pub network: String,
}

impl VerifiedPayment {
    pub fn nonce(&self) -> B256 {
        self.payload.authorization().nonce
    }

    /// Confirmation for the `X-PAYMENT-RESPONSE` header. Nothing is settled
    /// on-chain here, so the nonce stands in as the transaction reference.
    pub fn payment_response(&self) -> PaymentResponse {
        PaymentResponse {
            success: true,
            transaction: Some(self.nonce().to_string()),
            network: self.network.clone(),
            payer: Some(self.payer.clone()),
        }
    }
}

pub struct PaymentVerifier<F> {
    facilitator: F,
    nonce_store: Arc<dyn NonceStore>,
}

impl<F: Facilitator> PaymentVerifier<F> {
    pub fn new(facilitator: F) -> Self {
        Self {
            facilitator,
            nonce_store: Arc::new(InMemoryNonceStore::new()),
        }
    }

    pub fn with_nonce_store(mut self, store: Arc<dyn NonceStore>) -> Self {
        self.nonce_store = store;
        self
    }

    pub fn facilitator(&self) -> &F {
        &self.facilitator
    }

    pub fn nonce_store(&self) -> Arc<dyn NonceStore> {
        Arc::clone(&self.nonce_store)
    }

    pub async fn verify_header(
        &self,
        raw_header: &str,
        requirements: &PaymentRequirements,
    ) -> Result<VerifiedPayment, X402Error> {
        let payload = decode_payment(raw_header)?;

        if payload.scheme != requirements.scheme {
            return Err(X402Error::VerificationFailed(format!(
                "scheme '{}' does not match offered '{}'",
                payload.scheme, requirements.scheme
            )));
        }
        if payload.network != requirements.network {
            return Err(X402Error::VerificationFailed(format!(
                "network '{}' does not match offered '{}'",
                payload.network, requirements.network
            )));
        }

        let auth = payload.authorization();
        let nonce = auth.nonce;
        if self.nonce_store.is_used(&nonce) {
            tracing::warn!(nonce = %format!("{:.8}", nonce), payer = %auth.from, "replayed payment header");
            return Err(X402Error::VerificationFailed("nonce already used".to_string()));
        }

        let verdict = self
            .facilitator
            .verify(&payload, requirements)
            .await
            .map_err(|e| match e {
                X402Error::FacilitatorUnavailable(_) => e,
                other => X402Error::FacilitatorUnavailable(other.to_string()),
            })?;
        if !verdict.is_valid {
            let reason = verdict
                .invalid_reason
                .unwrap_or_else(|| "rejected by facilitator".to_string());
            tracing::info!(payer = %auth.from, reason = %reason, "payment rejected");
            return Err(X402Error::VerificationFailed(reason));
        }

        if !self.nonce_store.try_use(nonce) {
            tracing::warn!(nonce = %format!("{:.8}", nonce), "lost race for nonce");
            return Err(X402Error::VerificationFailed("nonce already used".to_string()));
        }

        Ok(VerifiedPayment {
            raw_header: raw_header.to_string(),
            payer: verdict.payer.unwrap_or_else(|| auth.from.clone()),
            receiver: requirements.pay_to.clone(),
            amount: auth.value.clone(),
            network: payload.network.clone(),
            payload,
        })
    }

    /// Undo the nonce claim of a payment whose action failed, here and at
    /// the facilitator, so the payer can retry with the same header.
    pub fn release(&self, payment: &VerifiedPayment) {
        let nonce = payment.nonce();
        self.nonce_store.release(&nonce);
        self.facilitator.release(&nonce);
        tracing::info!(nonce = %format!("{:.8}", nonce), payer = %payment.payer, "nonce released");
    }

    /// Purge nonces older than `max_age` every minute. Needs a tokio runtime.
    pub fn start_nonce_cleanup(&self, max_age: Duration) -> tokio::task::JoinHandle<()> {
        spawn_purge_task(Arc::clone(&self.nonce_store), max_age)
    }
}
