//! Network name to chain ID resolution.
//!
//! x402 v1 identifies ledgers by short names (`"base-sepolia"`), while
//! EIP-712 domains need the numeric chain ID. Unknown names resolve to
//! `None`; callers decide whether that is an error.

/// Networks with a known EVM chain ID.
pub const KNOWN_NETWORKS: &[(&str, u64)] = &[
    ("base-sepolia", 84532),
    ("base", 8453),
    ("avalanche-fuji", 43113),
    ("avalanche", 43114),
    ("iotex", 4689),
];

/// Look up the chain ID for a network name (exact, case-sensitive match).
pub fn chain_id_for_network(network: &str) -> Option<u64> {
    KNOWN_NETWORKS
        .iter()
        .find(|(name, _)| *name == network)
        .map(|(_, id)| *id)
}

/// Reverse lookup: the network name for a chain ID.
pub fn network_for_chain_id(chain_id: u64) -> Option<&'static str> {
    KNOWN_NETWORKS
        .iter()
        .find(|(_, id)| *id == chain_id)
        .map(|(name, _)| *name)
}
