//! Payment-gated URL shortener built on x402.
//!
//! `POST /api/create-short-url` answers unpaid requests with HTTP 402 and a
//! [`PaymentRequirements`](x402::PaymentRequirements) challenge, verifies the
//! `X-PAYMENT` header through a facilitator, and only then stores the link.
//!
//! # Modules
//!
//! - [`config`]: environment configuration and per-request [`PaymentTerms`](config::PaymentTerms)
//! - [`challenge`]: 402 response body
//! - [`middleware`]: payment gate ([`require_payment`](middleware::require_payment))
//! - [`db`]: SQLite link store
//! - [`routes`]: HTTP handlers, registered with [`configure`]
//! - [`metrics`]: Prometheus counters

pub mod challenge;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ConfigError, PaymentTerms, ServerConfig};
pub use db::{Link, LinkStore};
pub use error::ServerError;
pub use middleware::{require_payment, PaidRequest};
pub use routes::configure;
pub use state::AppState;
