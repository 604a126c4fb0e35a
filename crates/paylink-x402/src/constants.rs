/// x402 protocol version spoken by this crate.
pub const X402_VERSION: u32 = 1;

/// Scheme name for an exact-amount transfer authorization.
pub const SCHEME_EXACT: &str = "exact";

/// Request header carrying the encoded payment header (client -> server).
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Response header carrying the payment confirmation (server -> client).
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// `validAfter` is backdated by this many seconds to absorb clock skew
/// between the signer and the settlement verifier.
pub const VALID_AFTER_SKEW_SECS: u64 = 5;

/// EIP-712 domain name used when the descriptor's `extra` omits one.
pub const DEFAULT_EIP712_NAME: &str = "USD Coin";

/// EIP-712 domain version used when the descriptor's `extra` omits one.
pub const DEFAULT_EIP712_VERSION: &str = "2";

/// Default client spending ceiling in atomic units (0.1 of a 6-decimal token).
pub const DEFAULT_MAX_VALUE: u64 = 100_000;

/// Network name for Base Sepolia.
pub const BASE_SEPOLIA_NETWORK: &str = "base-sepolia";

/// Base Sepolia chain ID.
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;

/// USDC on Base Sepolia.
pub const BASE_SEPOLIA_USDC: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

/// USDC has 6 decimal places.
pub const USDC_DECIMALS: u32 = 6;

/// Runtime network configuration. Passed explicitly into the challenge
/// responder, signer and verifier so several networks can coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network: String,
    pub chain_id: u64,
    /// Token contract address, also the EIP-712 verifying contract.
    pub asset: String,
    pub eip712_name: String,
    pub eip712_version: String,
    pub token_decimals: u32,
}

impl NetworkConfig {
    /// Configuration for a network listed in [`crate::network::KNOWN_NETWORKS`].
    /// Returns `None` for unknown network names.
    pub fn known(network: &str, asset: &str) -> Option<Self> {
        let chain_id = crate::network::chain_id_for_network(network)?;
        Some(Self {
            network: network.to_string(),
            chain_id,
            asset: asset.to_string(),
            eip712_name: DEFAULT_EIP712_NAME.to_string(),
            eip712_version: DEFAULT_EIP712_VERSION.to_string(),
            token_decimals: USDC_DECIMALS,
        })
    }
}

impl Default for NetworkConfig {
    /// Defaults to USDC on Base Sepolia.
    fn default() -> Self {
        Self {
            network: BASE_SEPOLIA_NETWORK.to_string(),
            chain_id: BASE_SEPOLIA_CHAIN_ID,
            asset: BASE_SEPOLIA_USDC.to_string(),
            eip712_name: DEFAULT_EIP712_NAME.to_string(),
            eip712_version: DEFAULT_EIP712_VERSION.to_string(),
            token_decimals: USDC_DECIMALS,
        }
    }
}
