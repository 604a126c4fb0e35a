//! EIP-712 typed data for EIP-3009 `TransferWithAuthorization`.
//!
//! - [`TransferTypedData`] is the serializable document handed to a wallet
//! - [`TransferTypedData::signing_hash`] is the digest a local key signs
//! - [`verify_signature`] recovers the signer with EIP-2 malleability protection
//! - [`random_nonce`] draws authorization nonces from the OS CSPRNG

use std::borrow::Cow;

use alloy::primitives::{Address, Signature, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};

use crate::payment::parse_decimal_amount;
use crate::{PaymentRequirements, TransferAuthorization, TransferWithAuthorization, X402Error};

/// Primary type name of the signed message.
pub const PRIMARY_TYPE: &str = "TransferWithAuthorization";

/// Domain separator fields. The verifying contract is the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: String,
}

impl TypedDataDomain {
    /// Domain for a descriptor: name/version from `extra` (or the USDC
    /// defaults) and the asset as verifying contract.
    pub fn for_requirements(requirements: &PaymentRequirements, chain_id: u64) -> Self {
        Self {
            name: requirements.eip712_name(),
            version: requirements.eip712_version(),
            chain_id,
            verifying_contract: requirements.asset.clone(),
        }
    }

    /// Convert into alloy's domain type.
    pub fn to_alloy(&self) -> Result<Eip712Domain, X402Error> {
        let verifying_contract = parse_address("verifyingContract", &self.verifying_contract)?;
        Ok(Eip712Domain {
            name: Some(Cow::Owned(self.name.clone())),
            version: Some(Cow::Owned(self.version.clone())),
            chain_id: Some(U256::from(self.chain_id)),
            verifying_contract: Some(verifying_contract),
            salt: None,
        })
    }
}

/// A complete typed-data signing request: domain plus transfer message.
///
/// The message is the same [`TransferAuthorization`] that travels in the
/// payment header, so the signed value and the transmitted value cannot
/// drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTypedData {
    pub domain: TypedDataDomain,
    pub message: TransferAuthorization,
}

impl TransferTypedData {
    pub fn new(domain: TypedDataDomain, message: TransferAuthorization) -> Self {
        Self { domain, message }
    }

    /// The `eth_signTypedData_v4` document: `{types, primaryType, domain, message}`.
    pub fn to_eip712_json(&self) -> serde_json::Value {
        serde_json::json!({
            "types": {
                "EIP712Domain": [
                    {"name": "name", "type": "string"},
                    {"name": "version", "type": "string"},
                    {"name": "chainId", "type": "uint256"},
                    {"name": "verifyingContract", "type": "address"},
                ],
                PRIMARY_TYPE: [
                    {"name": "from", "type": "address"},
                    {"name": "to", "type": "address"},
                    {"name": "value", "type": "uint256"},
                    {"name": "validAfter", "type": "uint256"},
                    {"name": "validBefore", "type": "uint256"},
                    {"name": "nonce", "type": "bytes32"},
                ],
            },
            "primaryType": PRIMARY_TYPE,
            "domain": self.domain,
            "message": self.message,
        })
    }

    /// The message as the `sol!` struct. Fails if an address or the value
    /// does not parse.
    pub fn sol_message(&self) -> Result<TransferWithAuthorization, X402Error> {
        let m = &self.message;
        let value = parse_decimal_amount(&m.value)
            .map_err(|e| X402Error::InvalidRequirements(format!("value: {e}")))?;
        Ok(TransferWithAuthorization {
            from: parse_address("from", &m.from)?,
            to: parse_address("to", &m.to)?,
            value,
            validAfter: U256::from(m.valid_after),
            validBefore: U256::from(m.valid_before),
            nonce: m.nonce,
        })
    }

    /// EIP-712 digest (`keccak256("\x19\x01" || domainSeparator || structHash)`).
    pub fn signing_hash(&self) -> Result<B256, X402Error> {
        let domain = self.domain.to_alloy()?;
        Ok(self.sol_message()?.eip712_signing_hash(&domain))
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, X402Error> {
    value
        .parse::<Address>()
        .map_err(|e| X402Error::InvalidRequirements(format!("{field} '{value}' is not an address: {e}")))
}

/// secp256k1 curve order N / 2. Signatures with s above this are malleable (EIP-2).
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xBFD25E8CD0364140,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0x7FFFFFFFFFFFFFFF,
]);

/// Recover the address that produced `signature_hex` over `typed`.
pub fn verify_signature(typed: &TransferTypedData, signature_hex: &str) -> Result<Address, X402Error> {
    let raw = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let bytes = alloy::hex::decode(raw)
        .map_err(|e| X402Error::VerificationFailed(format!("signature is not hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(X402Error::VerificationFailed(format!(
            "signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }

    // from_raw accepts v in {0, 1, 27, 28} and rejects anything else.
    let sig = Signature::from_raw(&bytes)
        .map_err(|e| X402Error::VerificationFailed(format!("invalid signature: {e}")))?;
    if sig.s() > SECP256K1_N_DIV_2 {
        return Err(X402Error::VerificationFailed(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    let hash = typed.signing_hash()?;
    sig.recover_address_from_prehash(&hash)
        .map_err(|e| X402Error::VerificationFailed(format!("recovery failed: {e}")))
}

/// 32 bytes straight from the operating system's CSPRNG.
pub fn random_nonce() -> Result<B256, X402Error> {
    use rand::TryRngCore;

    let mut bytes = [0u8; 32];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| X402Error::EntropyUnavailable(e.to_string()))?;
    Ok(B256::from(bytes))
}

/// 0x-prefixed 65-byte hex, v encoded as 27/28.
pub fn encode_signature_hex(sig: &Signature) -> String {
    format!("0x{}", alloy::hex::encode(sig.as_bytes()))
}
