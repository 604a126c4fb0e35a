//! x402 challenge/response payments over HTTP.
//!
//! A server answers an unpaid request with `402 Payment Required` and a list
//! of [`PaymentRequirements`]. The client signs an EIP-3009
//! `TransferWithAuthorization` for one of them, base64-encodes it into the
//! `X-PAYMENT` header and retries. The server hands the decoded header and
//! its *own* descriptor to a facilitator and only acts on a valid verdict.
//!
//! # Roles
//!
//! - **Client**: [`ExactSchemeClient`] signs through any [`WalletSigner`]
//!   (e.g. [`LocalWallet`])
//! - **Server**: [`PaymentVerifier`] decodes, checks replay and asks a [`Facilitator`]
//! - **Facilitator**: [`HttpFacilitator`] for a remote service,
//!   [`LocalFacilitator`] for in-process verification
//!
//! # Example (client)
//!
//! ```no_run
//! use x402::{ExactSchemeClient, LocalWallet, PaymentRequirements};
//!
//! # async fn run(requirements: PaymentRequirements) -> Result<(), x402::X402Error> {
//! let wallet = LocalWallet::from_private_key("0xYOUR_KEY", 84532)?;
//! let header = ExactSchemeClient::new(&wallet)
//!     .create_payment_header(&requirements)
//!     .await?;
//! // send `header` as X-PAYMENT
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod error;
pub mod network;
pub mod payment;
pub mod response;
pub mod scheme;

pub mod eip712;
pub mod header;
pub mod hmac;
pub mod nonce_store;
pub mod price;
pub mod scheme_client;
pub mod scheme_facilitator;
pub mod verifier;
pub mod wallet;

pub mod facilitator_client;

use alloy::sol;

// EIP-3009 message. SolStruct provides eip712_signing_hash().
sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

pub use constants::*;
pub use error::{ErrorKind, X402Error};
pub use payment::*;
pub use response::*;
pub use scheme::*;

pub use eip712::{TransferTypedData, TypedDataDomain};
pub use facilitator_client::HttpFacilitator;
pub use header::{decode_payment, encode_payment};
pub use nonce_store::{InMemoryNonceStore, NonceStore, SqliteNonceStore};
pub use price::parse_price;
pub use scheme_client::ExactSchemeClient;
pub use scheme_facilitator::LocalFacilitator;
pub use verifier::{PaymentVerifier, VerifiedPayment};
pub use wallet::LocalWallet;
