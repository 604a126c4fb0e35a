use thiserror::Error;

/// Errors returned by x402 operations.
///
/// Every variant belongs to exactly one [`ErrorKind`] so callers can tell a
/// malformed exchange from a policy refusal, a wallet problem, a rejected
/// payment or a network failure without string matching.
#[derive(Debug, Error)]
pub enum X402Error {
    #[error("malformed payment challenge: {0}")]
    MalformedChallenge(String),

    #[error("malformed payment header: {0}")]
    MalformedHeader(String),

    #[error("invalid payment requirements: {0}")]
    InvalidRequirements(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("payment of {required} exceeds spending ceiling {ceiling}")]
    OverBudget { required: String, ceiling: String },

    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),

    #[error("signing rejected: {0}")]
    SigningRejected(String),

    #[error("secure randomness unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("payment invalid or expired: {0}")]
    VerificationFailed(String),

    #[error("facilitator unavailable: {0}")]
    FacilitatorUnavailable(String),

    #[error("payment rejected by server: {0}")]
    PaymentRejected(String),

    #[error("http error: {0}")]
    HttpError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed challenge, header or descriptor. Never retried.
    Format,
    /// Unsupported scheme or amount above the caller's ceiling.
    Policy,
    /// Wallet missing, wrong network, or signature refused.
    Capability,
    /// Facilitator rejected the payment or could not be reached.
    Verification,
    /// Network failure on the challenge or retry leg.
    Transport,
    Config,
}

impl X402Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            X402Error::MalformedChallenge(_)
            | X402Error::MalformedHeader(_)
            | X402Error::InvalidRequirements(_)
            | X402Error::SerdeError(_) => ErrorKind::Format,
            X402Error::UnsupportedScheme(_) | X402Error::OverBudget { .. } => ErrorKind::Policy,
            X402Error::WalletUnavailable(_)
            | X402Error::SigningRejected(_)
            | X402Error::EntropyUnavailable(_) => ErrorKind::Capability,
            X402Error::VerificationFailed(_)
            | X402Error::FacilitatorUnavailable(_)
            | X402Error::PaymentRejected(_) => ErrorKind::Verification,
            X402Error::HttpError(_) => ErrorKind::Transport,
            X402Error::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// Stable machine-readable code, suitable for JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            X402Error::MalformedChallenge(_) => "malformed_challenge",
            X402Error::MalformedHeader(_) => "malformed_header",
            X402Error::InvalidRequirements(_) => "invalid_requirements",
            X402Error::UnsupportedScheme(_) => "unsupported_scheme",
            X402Error::OverBudget { .. } => "over_budget",
            X402Error::WalletUnavailable(_) => "wallet_unavailable",
            X402Error::SigningRejected(_) => "signing_rejected",
            X402Error::EntropyUnavailable(_) => "entropy_unavailable",
            X402Error::VerificationFailed(_) => "verification_failed",
            X402Error::FacilitatorUnavailable(_) => "facilitator_unavailable",
            X402Error::PaymentRejected(_) => "payment_rejected",
            X402Error::HttpError(_) => "http_error",
            X402Error::ConfigError(_) => "config_error",
            X402Error::SerdeError(_) => "serialization_error",
        }
    }
}
