use x402::PaymentVerifier;

use crate::config::PaymentTerms;
use crate::db::LinkStore;

/// Shared application state. Generic over the facilitator so tests can
/// plug in a stub and the binary can choose remote or in-process verification.
pub struct AppState<F> {
    pub terms: PaymentTerms,
    pub verifier: PaymentVerifier<F>,
    pub links: LinkStore,
    /// Prefix for returned short URLs, without a trailing slash.
    pub base_url: String,
    /// Separate bearer token for /metrics endpoint
    pub metrics_token: Option<Vec<u8>>,
    pub public_metrics: bool,
}
