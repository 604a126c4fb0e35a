use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use alloy::primitives::U256;
use x402::{TransferTypedData, PAYMENT_HEADER};
use x402_client::{
    decode_payment, HttpTransport, InboundResponse, OutboundRequest, PaymentResponse,
    WalletSigner, X402Client, X402Error,
};

/// Transport that replays scripted responses and records every request.
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<InboundResponse, X402Error>>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<InboundResponse, X402Error>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<InboundResponse, X402Error> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(X402Error::HttpError("script exhausted".to_string())))
    }
}

/// Wallet that counts signing requests and returns a fixed signature.
struct CountingWallet {
    signs: AtomicUsize,
}

impl CountingWallet {
    fn new() -> Self {
        Self {
            signs: AtomicUsize::new(0),
        }
    }

    fn signs(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }
}

impl WalletSigner for CountingWallet {
    fn address(&self) -> Option<String> {
        Some("0xPayer".to_string())
    }

    fn chain_id(&self) -> Option<u64> {
        Some(84532)
    }

    async fn sign_typed_data(&self, _typed: &TransferTypedData) -> Result<String, X402Error> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        Ok(format!("0x{}", "11".repeat(65)))
    }
}

fn descriptor(amount: &str) -> serde_json::Value {
    serde_json::json!({
        "scheme": "exact",
        "network": "base-sepolia",
        "maxAmountRequired": amount,
        "resource": "http://localhost:3000/api/create-short-url",
        "description": "URL Shortening Service",
        "mimeType": "application/json",
        "payTo": "0xReceiver",
        "maxTimeoutSeconds": 60,
        "asset": "0xUSDC",
        "extra": {"name": "USD Coin", "version": "2"}
    })
}

fn payment_required(accepts: serde_json::Value) -> InboundResponse {
    InboundResponse::new(402).with_json(&serde_json::json!({
        "x402Version": 1,
        "accepts": accepts,
        "error": "Payment required"
    }))
}

fn request() -> OutboundRequest {
    OutboundRequest::post_json(
        "http://localhost:3000/api/create-short-url",
        &serde_json::json!({"originalUrl": "https://example.com"}),
    )
    .unwrap()
}

#[tokio::test]
async fn test_non_402_passes_through_without_signing() {
    let transport = ScriptedTransport::new(vec![Ok(InboundResponse::new(500)
        .with_json(&serde_json::json!({"error": "boom"})))]);
    let client = X402Client::with_transport(transport);
    let wallet = CountingWallet::new();

    let paid = client.fetch(&wallet, &request()).await.unwrap();
    assert_eq!(paid.response.status, 500);
    assert!(!paid.response.is_success());
    assert!(!paid.paid());
    assert_eq!(wallet.signs(), 0);
    assert_eq!(client.transport().requests().len(), 1);
}

#[tokio::test]
async fn test_pays_and_retries_with_header() {
    let confirmation = PaymentResponse {
        success: true,
        transaction: Some("0xabc".to_string()),
        network: "base-sepolia".to_string(),
        payer: Some("0xPayer".to_string()),
    };
    let transport = ScriptedTransport::new(vec![
        Ok(payment_required(serde_json::json!([descriptor("1000")]))),
        Ok(InboundResponse::new(200)
            .with_header("x-payment-response", confirmation.encode().unwrap())
            .with_json(&serde_json::json!({"success": true}))),
    ]);
    let client = X402Client::with_transport(transport);
    let wallet = CountingWallet::new();

    let paid = client.fetch(&wallet, &request()).await.unwrap();
    assert_eq!(paid.response.status, 200);
    assert!(paid.response.is_success());
    assert_eq!(paid.payment, Some(confirmation));
    assert_eq!(wallet.signs(), 1);

    let sent = client.transport().requests();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].header(PAYMENT_HEADER).is_none());
    // Retry is the original request plus the payment header.
    assert_eq!(sent[1].body, sent[0].body);
    assert_eq!(sent[1].url, sent[0].url);
    let header = decode_payment(sent[1].header(PAYMENT_HEADER).unwrap()).unwrap();
    assert_eq!(header.authorization().value, "1000");
    assert_eq!(header.authorization().to, "0xReceiver");
    assert_eq!(header.scheme, "exact");
    assert_eq!(header.network, "base-sepolia");
}

#[tokio::test]
async fn test_over_budget_fails_before_signing() {
    let transport = ScriptedTransport::new(vec![Ok(payment_required(serde_json::json!([
        descriptor("1000")
    ])))]);
    let client = X402Client::with_transport(transport).with_max_value(U256::from(500u64));
    let wallet = CountingWallet::new();

    let err = client.fetch(&wallet, &request()).await.unwrap_err();
    match err {
        X402Error::OverBudget { required, ceiling } => {
            assert_eq!(required, "1000");
            assert_eq!(ceiling, "500");
        }
        other => panic!("expected over-budget, got {other:?}"),
    }
    assert_eq!(wallet.signs(), 0);
    assert_eq!(client.transport().requests().len(), 1);
}

#[tokio::test]
async fn test_picks_first_affordable_descriptor() {
    let mut cheap = descriptor("400");
    cheap["payTo"] = serde_json::json!("0xCheap");
    let transport = ScriptedTransport::new(vec![
        Ok(payment_required(serde_json::json!([descriptor("1000"), cheap]))),
        Ok(InboundResponse::new(200)),
    ]);
    let client = X402Client::with_transport(transport).with_max_value(U256::from(500u64));
    let wallet = CountingWallet::new();

    client.fetch(&wallet, &request()).await.unwrap();
    let sent = client.transport().requests();
    let header = decode_payment(sent[1].header(PAYMENT_HEADER).unwrap()).unwrap();
    assert_eq!(header.authorization().to, "0xCheap");
    assert_eq!(header.authorization().value, "400");
}

#[tokio::test]
async fn test_second_402_is_terminal() {
    let transport = ScriptedTransport::new(vec![
        Ok(payment_required(serde_json::json!([descriptor("1000")]))),
        Ok(payment_required(serde_json::json!([descriptor("1000")]))),
        Ok(InboundResponse::new(200)),
    ]);
    let client = X402Client::with_transport(transport);
    let wallet = CountingWallet::new();

    let err = client.fetch(&wallet, &request()).await.unwrap_err();
    assert!(matches!(err, X402Error::PaymentRejected(ref r) if r == "Payment required"));
    assert_eq!(client.transport().requests().len(), 2);
    assert_eq!(wallet.signs(), 1);
}

#[tokio::test]
async fn test_missing_accepts_is_format_error() {
    let transport = ScriptedTransport::new(vec![Ok(InboundResponse::new(402)
        .with_json(&serde_json::json!({"x402Version": 1, "error": "pay"})))]);
    let client = X402Client::with_transport(transport);
    let wallet = CountingWallet::new();

    let err = client.fetch(&wallet, &request()).await.unwrap_err();
    assert!(matches!(err, X402Error::MalformedChallenge(_)));
    assert_eq!(err.kind(), x402::ErrorKind::Format);
    assert_eq!(wallet.signs(), 0);
}

#[tokio::test]
async fn test_unsupported_scheme_is_policy_error() {
    let mut upto = descriptor("1000");
    upto["scheme"] = serde_json::json!("upto");
    let transport = ScriptedTransport::new(vec![Ok(payment_required(serde_json::json!([upto])))]);
    let client = X402Client::with_transport(transport);
    let wallet = CountingWallet::new();

    let err = client.fetch(&wallet, &request()).await.unwrap_err();
    assert!(matches!(err, X402Error::UnsupportedScheme(_)));
    assert_eq!(err.kind(), x402::ErrorKind::Policy);
    assert_eq!(wallet.signs(), 0);
}

#[tokio::test]
async fn test_transport_errors_surface_on_either_leg() {
    let client = X402Client::with_transport(ScriptedTransport::new(vec![Err(
        X402Error::HttpError("connection refused".to_string()),
    )]));
    let err = client
        .fetch(&CountingWallet::new(), &request())
        .await
        .unwrap_err();
    assert!(matches!(err, X402Error::HttpError(_)));

    let client = X402Client::with_transport(ScriptedTransport::new(vec![
        Ok(payment_required(serde_json::json!([descriptor("1000")]))),
        Err(X402Error::HttpError("reset".to_string())),
    ]));
    let err = client
        .fetch(&CountingWallet::new(), &request())
        .await
        .unwrap_err();
    assert!(matches!(err, X402Error::HttpError(ref m) if m == "reset"));
    assert_eq!(client.transport().requests().len(), 2);
}

#[tokio::test]
async fn test_plain_json_confirmation_is_accepted() {
    let transport = ScriptedTransport::new(vec![
        Ok(payment_required(serde_json::json!([descriptor("1000")]))),
        Ok(InboundResponse::new(200).with_header(
            "X-Payment-Response",
            r#"{"success":true,"transaction":"0x1","network":"base-sepolia","payer":"0xPayer"}"#,
        )),
    ]);
    let client = X402Client::with_transport(transport);
    let paid = client
        .fetch(&CountingWallet::new(), &request())
        .await
        .unwrap();
    assert_eq!(paid.payment.unwrap().transaction.as_deref(), Some("0x1"));
}
