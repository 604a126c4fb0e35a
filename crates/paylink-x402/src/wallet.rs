use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use crate::eip712::{encode_signature_hex, TransferTypedData};
use crate::{WalletSigner, X402Error};

/// A wallet backed by a local private key, pinned to one chain.
#[derive(Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl LocalWallet {
    pub fn new(signer: PrivateKeySigner, chain_id: u64) -> Self {
        Self { signer, chain_id }
    }

    /// Parse a hex private key (with or without `0x`).
    pub fn from_private_key(key: &str, chain_id: u64) -> Result<Self, X402Error> {
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|e| X402Error::WalletUnavailable(format!("invalid private key: {e}")))?;
        Ok(Self::new(signer, chain_id))
    }

    pub fn signer_address(&self) -> alloy::primitives::Address {
        self.signer.address()
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.signer.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl WalletSigner for LocalWallet {
    fn address(&self) -> Option<String> {
        Some(self.signer.address().to_string())
    }

    fn chain_id(&self) -> Option<u64> {
        Some(self.chain_id)
    }

    async fn sign_typed_data(&self, typed: &TransferTypedData) -> Result<String, X402Error> {
        if typed.domain.chain_id != self.chain_id {
            return Err(X402Error::WalletUnavailable(format!(
                "wallet is on chain {}, typed data targets chain {}",
                self.chain_id, typed.domain.chain_id
            )));
        }
        let hash = typed.signing_hash()?;
        let sig = self
            .signer
            .sign_hash_sync(&hash)
            .map_err(|e| X402Error::SigningRejected(format!("signing failed: {e}")))?;
        Ok(encode_signature_hex(&sig))
    }
}
