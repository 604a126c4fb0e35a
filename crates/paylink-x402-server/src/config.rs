use actix_web::HttpRequest;
use alloy::primitives::Address;
use std::env;
use url::Url;
use x402::{
    parse_price, NetworkConfig, PaymentRequirements, BASE_SEPOLIA_NETWORK, BASE_SEPOLIA_USDC,
    SCHEME_EXACT,
};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PRICE: &str = "$0.001";
const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";
const DEFAULT_DB_PATH: &str = "./paylink.db";
const DEFAULT_NONCE_DB_PATH: &str = "./paylink-nonces.db";
const DEFAULT_RATE_LIMIT_RPM: u64 = 60;

pub const SERVICE_DESCRIPTION: &str = "URL Shortening Service";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("invalid price: {0}")]
    InvalidPrice(#[from] x402::X402Error),
}

#[derive(Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Recipient of every payment.
    pub pay_to: String,
    pub network: NetworkConfig,
    /// Human price as configured, e.g. "$0.001".
    pub price: String,
    /// `price` in atomic token units.
    pub amount: String,
    pub max_timeout_seconds: u64,
    pub facilitator_url: String,
    /// HMAC shared secret for facilitator auth (None = unsigned requests)
    pub hmac_secret: Option<Vec<u8>>,
    /// Verify payments in-process instead of calling the facilitator.
    pub local_facilitator: bool,
    pub db_path: String,
    pub nonce_db_path: String,
    /// Prefix for returned short URLs.
    pub base_url: String,
    pub rate_limit_rpm: u64,
    /// Empty = localhost only.
    pub allowed_origins: Vec<String>,
    /// Bearer token required for /metrics
    pub metrics_token: Option<String>,
    /// Serve /metrics without a token when none is configured.
    pub public_metrics: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("pay_to", &self.pay_to)
            .field("network", &self.network.network)
            .field("asset", &self.network.asset)
            .field("price", &self.price)
            .field("amount", &self.amount)
            .field("max_timeout_seconds", &self.max_timeout_seconds)
            .field("facilitator_url", &self.facilitator_url)
            .field(
                "hmac_secret",
                &self.hmac_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("local_facilitator", &self.local_facilitator)
            .field("db_path", &self.db_path)
            .field("nonce_db_path", &self.nonce_db_path)
            .field("base_url", &self.base_url)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("allowed_origins", &self.allowed_origins)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("public_metrics", &self.public_metrics)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |key: &str| var(key).map(|v| v == "true" || v == "1").unwrap_or(false);

        // Required: payment recipient
        let pay_to = var("PAY_TO").ok_or(ConfigError::MissingRequired("PAY_TO"))?;
        pay_to
            .parse::<Address>()
            .map_err(|_| ConfigError::InvalidAddress(pay_to.clone()))?;

        let network_name = var("NETWORK").unwrap_or_else(|| BASE_SEPOLIA_NETWORK.to_string());
        let asset = var("ASSET").unwrap_or_else(|| BASE_SEPOLIA_USDC.to_string());
        asset
            .parse::<Address>()
            .map_err(|_| ConfigError::InvalidAddress(asset.clone()))?;
        let network = NetworkConfig::known(&network_name, &asset)
            .ok_or(ConfigError::UnknownNetwork(network_name))?;

        let price = var("PRICE").unwrap_or_else(|| DEFAULT_PRICE.to_string());
        let amount = parse_price(&price, network.token_decimals)?;
        if amount == "0" {
            return Err(ConfigError::InvalidValue {
                name: "PRICE",
                value: price,
            });
        }

        let port = parse_or("PORT", var("PORT"), DEFAULT_PORT)?;
        let max_timeout_seconds = parse_or(
            "MAX_TIMEOUT_SECONDS",
            var("MAX_TIMEOUT_SECONDS"),
            DEFAULT_MAX_TIMEOUT_SECONDS,
        )?;
        if max_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        let facilitator_url = var("FACILITATOR_URL")
            .unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Url::parse(&facilitator_url).map_err(|_| ConfigError::InvalidUrl(facilitator_url.clone()))?;

        let base_url = var("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();
        Url::parse(&base_url).map_err(|_| ConfigError::InvalidUrl(base_url.clone()))?;

        let allowed_origins = var("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            pay_to,
            network,
            price,
            amount,
            max_timeout_seconds,
            facilitator_url,
            hmac_secret: var("FACILITATOR_SHARED_SECRET").map(String::into_bytes),
            local_facilitator: flag("LOCAL_FACILITATOR"),
            db_path: var("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            nonce_db_path: var("NONCE_DB_PATH").unwrap_or_else(|| DEFAULT_NONCE_DB_PATH.to_string()),
            base_url,
            rate_limit_rpm: parse_or("RATE_LIMIT_RPM", var("RATE_LIMIT_RPM"), DEFAULT_RATE_LIMIT_RPM)?,
            allowed_origins,
            metrics_token: var("METRICS_TOKEN"),
            public_metrics: flag("PUBLIC_METRICS"),
        })
    }

    pub fn payment_terms(&self) -> PaymentTerms {
        PaymentTerms {
            network: self.network.clone(),
            pay_to: self.pay_to.clone(),
            amount: self.amount.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            description: SERVICE_DESCRIPTION.to_string(),
            mime_type: "application/json".to_string(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue { name, value: v }),
    }
}

/// What the server charges for the protected action.
///
/// The descriptor is rebuilt for every request because `resource` depends on
/// the inbound host and scheme.
#[derive(Debug, Clone)]
pub struct PaymentTerms {
    pub network: NetworkConfig,
    pub pay_to: String,
    pub amount: String,
    pub max_timeout_seconds: u64,
    pub description: String,
    pub mime_type: String,
}

impl PaymentTerms {
    pub fn requirements_for(&self, req: &HttpRequest) -> PaymentRequirements {
        PaymentRequirements {
            scheme: SCHEME_EXACT.to_string(),
            network: self.network.network.clone(),
            max_amount_required: self.amount.clone(),
            resource: resource_url(req),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.network.asset.clone(),
            extra: Some(serde_json::json!({
                "name": self.network.eip712_name,
                "version": self.network.eip712_version,
            })),
        }
    }
}

/// `<scheme>://<host><path>`, honoring `X-Forwarded-Proto` and `X-Forwarded-Host`.
pub fn resource_url(req: &HttpRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}{}", info.scheme(), info.host(), req.path())
}
