use crate::constants::{SCHEME_EXACT, VALID_AFTER_SKEW_SECS, X402_VERSION};
use crate::eip712::{random_nonce, TransferTypedData, TypedDataDomain};
use crate::header::encode_payment;
use crate::network::{chain_id_for_network, network_for_chain_id};
use crate::payment::unix_now;
use crate::{
    ExactPayload, PaymentPayload, PaymentRequirements, SchemeClient, TransferAuthorization,
    WalletSigner, X402Error,
};

/// Signs `exact` scheme authorizations with a borrowed or owned wallet.
///
/// Pays exactly `maxAmountRequired`. Every call draws a fresh nonce and a
/// fresh validity window; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct ExactSchemeClient<W> {
    wallet: W,
}

impl<W: WalletSigner> ExactSchemeClient<W> {
    pub fn new(wallet: W) -> Self {
        Self { wallet }
    }

    /// Sign and encode in one step, yielding the `X-PAYMENT` header value.
    pub async fn create_payment_header(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<String, X402Error> {
        let payload = self
            .create_payment_payload(X402_VERSION, requirements)
            .await?;
        encode_payment(&payload)
    }

    pub(crate) async fn sign_at(
        &self,
        x402_version: u32,
        requirements: &PaymentRequirements,
        now: u64,
    ) -> Result<PaymentPayload, X402Error> {
        if requirements.scheme != SCHEME_EXACT {
            return Err(X402Error::UnsupportedScheme(requirements.scheme.clone()));
        }
        requirements.validate()?;

        let from = self
            .wallet
            .address()
            .ok_or_else(|| X402Error::WalletUnavailable("no account connected".to_string()))?;
        let chain_id = self
            .wallet
            .chain_id()
            .ok_or_else(|| X402Error::WalletUnavailable("wallet reports no chain".to_string()))?;
        if let Some(expected) = chain_id_for_network(&requirements.network) {
            if expected != chain_id {
                let current = match network_for_chain_id(chain_id) {
                    Some(name) => format!("{name} ({chain_id})"),
                    None => format!("chain {chain_id}"),
                };
                return Err(X402Error::WalletUnavailable(format!(
                    "wallet is on {current}, switch to {} ({expected})",
                    requirements.network
                )));
            }
        }

        let nonce = random_nonce()?;
        let valid_before = now
            .checked_add(requirements.max_timeout_seconds)
            .ok_or_else(|| {
                X402Error::InvalidRequirements("maxTimeoutSeconds overflows".to_string())
            })?;
        let authorization = TransferAuthorization {
            from,
            to: requirements.pay_to.clone(),
            value: requirements.max_amount_required.clone(),
            valid_after: now.saturating_sub(VALID_AFTER_SKEW_SECS),
            valid_before,
            nonce,
        };

        let typed = TransferTypedData::new(
            TypedDataDomain::for_requirements(requirements, chain_id),
            authorization,
        );
        let signature = self.wallet.sign_typed_data(&typed).await?;

        let nonce_hex = typed.message.nonce.to_string();
        tracing::debug!(
            network = %requirements.network,
            pay_to = %requirements.pay_to,
            value = %typed.message.value,
            nonce = %&nonce_hex[..10],
            "signed transfer authorization"
        );

        Ok(PaymentPayload {
            x402_version,
            scheme: requirements.scheme.clone(),
            network: requirements.network.clone(),
            payload: ExactPayload {
                signature,
                authorization: typed.message,
            },
        })
    }
}

impl<W: WalletSigner> SchemeClient for ExactSchemeClient<W> {
    async fn create_payment_payload(
        &self,
        x402_version: u32,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, X402Error> {
        self.sign_at(x402_version, requirements, unix_now()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::decode_payment;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Wallet that records what it was asked to sign.
    struct RecordingWallet {
        address: Option<String>,
        chain_id: Option<u64>,
        refuse: bool,
        calls: AtomicUsize,
        last: Mutex<Option<TransferTypedData>>,
    }

    impl RecordingWallet {
        fn connected() -> Self {
            Self {
                address: Some("0xPayer".to_string()),
                chain_id: Some(84532),
                refuse: false,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            }
        }
    }

    impl WalletSigner for RecordingWallet {
        fn address(&self) -> Option<String> {
            self.address.clone()
        }

        fn chain_id(&self) -> Option<u64> {
            self.chain_id
        }

        async fn sign_typed_data(&self, typed: &TransferTypedData) -> Result<String, X402Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(typed.clone());
            if self.refuse {
                return Err(X402Error::SigningRejected("user rejected".to_string()));
            }
            Ok(format!("0x{}", "ab".repeat(65)))
        }
    }

    fn scenario_requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: "base-sepolia".to_string(),
            max_amount_required: "1000".to_string(),
            resource: "http://localhost:3000/api/create-short-url".to_string(),
            description: String::new(),
            mime_type: String::new(),
            pay_to: "0xReceiver".to_string(),
            max_timeout_seconds: 60,
            asset: "0xUSDC".to_string(),
            extra: None,
        }
    }

    #[tokio::test]
    async fn test_scenario_header_carries_value_and_recipient() {
        let client = ExactSchemeClient::new(RecordingWallet::connected());
        let header = client
            .create_payment_header(&scenario_requirements())
            .await
            .unwrap();

        let decoded = decode_payment(&header).unwrap();
        assert_eq!(decoded.x402_version, 1);
        assert_eq!(decoded.scheme, "exact");
        assert_eq!(decoded.network, "base-sepolia");
        assert_eq!(decoded.authorization().value, "1000");
        assert_eq!(decoded.authorization().to, "0xReceiver");
        assert_eq!(decoded.authorization().from, "0xPayer");
    }

    #[tokio::test]
    async fn test_validity_window_brackets_now() {
        let client = ExactSchemeClient::new(RecordingWallet::connected());
        let now = 1_700_000_000;
        let payload = client
            .sign_at(1, &scenario_requirements(), now)
            .await
            .unwrap();
        let auth = payload.authorization();
        assert!(auth.valid_after < now && now < auth.valid_before);
        assert_eq!(auth.valid_after, now - 5);
        assert_eq!(auth.valid_before, now + 60);
        assert_eq!(auth.valid_before - auth.valid_after, 65);
    }

    #[tokio::test]
    async fn test_signed_message_matches_transmitted_authorization() {
        let wallet = RecordingWallet::connected();
        let client = ExactSchemeClient::new(&wallet);
        let payload = client
            .create_payment_payload(1, &scenario_requirements())
            .await
            .unwrap();

        let signed = wallet.last.lock().unwrap().clone().unwrap();
        assert_eq!(&signed.message, payload.authorization());
        assert_eq!(signed.domain.name, "USD Coin");
        assert_eq!(signed.domain.version, "2");
        assert_eq!(signed.domain.chain_id, 84532);
        assert_eq!(signed.domain.verifying_contract, "0xUSDC");
    }

    #[tokio::test]
    async fn test_each_payload_gets_fresh_nonce() {
        let client = ExactSchemeClient::new(RecordingWallet::connected());
        let req = scenario_requirements();
        let a = client.create_payment_payload(1, &req).await.unwrap();
        let b = client.create_payment_payload(1, &req).await.unwrap();
        assert_ne!(a.authorization().nonce, b.authorization().nonce);
    }

    #[tokio::test]
    async fn test_unsupported_scheme_never_signs() {
        let wallet = RecordingWallet::connected();
        let client = ExactSchemeClient::new(&wallet);
        let mut req = scenario_requirements();
        req.scheme = "upto".to_string();
        let err = client.create_payment_payload(1, &req).await.unwrap_err();
        assert!(matches!(err, X402Error::UnsupportedScheme(ref s) if s == "upto"));
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disconnected_wallet_is_capability_error() {
        let mut wallet = RecordingWallet::connected();
        wallet.address = None;
        let client = ExactSchemeClient::new(&wallet);
        let err = client
            .create_payment_payload(1, &scenario_requirements())
            .await
            .unwrap_err();
        assert!(matches!(err, X402Error::WalletUnavailable(_)));
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_chain_asks_for_switch() {
        let mut wallet = RecordingWallet::connected();
        wallet.chain_id = Some(1);
        let client = ExactSchemeClient::new(&wallet);
        let err = client
            .create_payment_payload(1, &scenario_requirements())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("switch to base-sepolia"));
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 0);

        wallet.chain_id = Some(8453);
        let err = ExactSchemeClient::new(&wallet)
            .create_payment_payload(1, &scenario_requirements())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("wallet is on base (8453)"));
    }

    #[tokio::test]
    async fn test_unknown_network_uses_wallet_chain() {
        let mut wallet = RecordingWallet::connected();
        wallet.chain_id = Some(31337);
        let client = ExactSchemeClient::new(&wallet);
        let mut req = scenario_requirements();
        req.network = "anvil".to_string();
        client.create_payment_payload(1, &req).await.unwrap();
        let signed = wallet.last.lock().unwrap().clone().unwrap();
        assert_eq!(signed.domain.chain_id, 31337);
    }

    #[tokio::test]
    async fn test_signing_refusal_surfaces() {
        let mut wallet = RecordingWallet::connected();
        wallet.refuse = true;
        let client = ExactSchemeClient::new(&wallet);
        let err = client
            .create_payment_payload(1, &scenario_requirements())
            .await
            .unwrap_err();
        assert!(matches!(err, X402Error::SigningRejected(_)));
    }

    #[tokio::test]
    async fn test_extra_overrides_domain_name() {
        let wallet = RecordingWallet::connected();
        let client = ExactSchemeClient::new(&wallet);
        let mut req = scenario_requirements();
        req.extra = Some(serde_json::json!({"name": "USDC", "version": "2"}));
        client.create_payment_payload(1, &req).await.unwrap();
        let signed = wallet.last.lock().unwrap().clone().unwrap();
        assert_eq!(signed.domain.name, "USDC");
    }

    #[tokio::test]
    async fn test_invalid_descriptor_is_format_error() {
        let client = ExactSchemeClient::new(RecordingWallet::connected());
        let mut req = scenario_requirements();
        req.max_amount_required = "ten".to_string();
        let err = client.create_payment_payload(1, &req).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
    }
}
