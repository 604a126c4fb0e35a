//! Trait seams of the exchange.
//!
//! - [`WalletSigner`]: the payer's key holder, an opaque capability
//! - [`SchemeClient`]: turns a descriptor into a signed payment payload
//! - [`Facilitator`]: the external authority that judges a payment
//! - [`PaymentSelector`]: picks one descriptor out of a challenge

use alloy::primitives::{B256, U256};

use crate::eip712::TransferTypedData;
use crate::error::X402Error;
use crate::payment::{PaymentPayload, PaymentRequirements};
use crate::response::VerifyResponse;

/// Account holder able to sign typed data.
///
/// `None` from [`address`](Self::address) or [`chain_id`](Self::chain_id)
/// means the wallet is not connected.
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Option<String>;

    fn chain_id(&self) -> Option<u64>;

    /// Sign the typed data, returning a 0x-prefixed 65-byte signature.
    fn sign_typed_data(
        &self,
        typed: &TransferTypedData,
    ) -> impl std::future::Future<Output = Result<String, X402Error>> + Send;
}

impl<W: WalletSigner> WalletSigner for &W {
    fn address(&self) -> Option<String> {
        (**self).address()
    }

    fn chain_id(&self) -> Option<u64> {
        (**self).chain_id()
    }

    fn sign_typed_data(
        &self,
        typed: &TransferTypedData,
    ) -> impl std::future::Future<Output = Result<String, X402Error>> + Send {
        (**self).sign_typed_data(typed)
    }
}

/// Client-side scheme: creates signed payment payloads.
pub trait SchemeClient: Send + Sync {
    fn create_payment_payload(
        &self,
        x402_version: u32,
        requirements: &PaymentRequirements,
    ) -> impl std::future::Future<Output = Result<PaymentPayload, X402Error>> + Send;
}

/// Verification authority.
///
/// `requirements` must be the descriptor the server itself issued, never
/// one reconstructed from the client's header.
pub trait Facilitator: Send + Sync {
    fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> impl std::future::Future<Output = Result<VerifyResponse, X402Error>> + Send;

    /// Forget an accepted nonce whose paid action then failed, so the same
    /// authorization can be presented again. Facilitators that keep no
    /// record of accepted nonces have nothing to undo.
    fn release(&self, _nonce: &B256) {}
}

/// Chooses which offered descriptor to pay.
pub trait PaymentSelector: Send + Sync {
    /// Returns `None` when no candidate is acceptable under `ceiling`.
    fn select<'a>(
        &self,
        candidates: &'a [PaymentRequirements],
        ceiling: U256,
    ) -> Option<&'a PaymentRequirements>;
}

/// First candidate whose `maxAmountRequired` does not exceed the ceiling.
/// Candidates with an unparseable amount are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAffordable;

impl PaymentSelector for FirstAffordable {
    fn select<'a>(
        &self,
        candidates: &'a [PaymentRequirements],
        ceiling: U256,
    ) -> Option<&'a PaymentRequirements> {
        candidates
            .iter()
            .find(|c| matches!(c.max_amount(), Ok(amount) if amount <= ceiling))
    }
}
