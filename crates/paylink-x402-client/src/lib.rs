//! Paying HTTP client for x402-protected APIs.
//!
//! [`X402Client::fetch`] sends a request; if the server answers 402 it picks
//! an affordable descriptor, signs a transfer authorization with the borrowed
//! wallet and retries once with the `X-PAYMENT` header.
//!
//! ```no_run
//! use x402_client::{LocalWallet, X402Client};
//!
//! # async fn run() -> Result<(), x402_client::X402Error> {
//! let wallet = LocalWallet::from_private_key("0xYOUR_KEY", 84532)?;
//! let client = X402Client::new()?;
//!
//! let paid = client
//!     .post_json(
//!         &wallet,
//!         "http://localhost:3000/api/create-short-url",
//!         &serde_json::json!({"originalUrl": "https://example.com"}),
//!     )
//!     .await?;
//! if let Some(payment) = paid.payment {
//!     println!("paid, reference {:?}", payment.transaction);
//! }
//! # Ok(())
//! # }
//! ```

mod http_client;
pub mod transport;

pub use http_client::{parse_challenge, FetchState, PaidResponse, X402Client};
pub use transport::{HttpTransport, InboundResponse, OutboundRequest, ReqwestTransport};

pub use x402::{
    decode_payment, encode_payment, ExactSchemeClient, FirstAffordable, LocalWallet,
    PaymentPayload, PaymentRequiredBody, PaymentRequirements, PaymentResponse, PaymentSelector,
    WalletSigner, X402Error,
};
