use alloy::primitives::B256;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use x402::hmac::compute_hmac;
use x402::{
    ExactPayload, Facilitator, HttpFacilitator, PaymentPayload, PaymentRequirements,
    TransferAuthorization, X402Error,
};

/// Serve one HTTP request with a canned response and hand back the raw request.
async fn one_shot_server(
    status: &'static str,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(split) = text.find("\r\n\r\n") {
                let content_length = text[..split]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= split + 4 + content_length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    });
    (url, handle)
}

fn requirements() -> PaymentRequirements {
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

fn payload() -> PaymentPayload {
    PaymentPayload {
        x402_version: 1,
        scheme: "exact".to_string(),
        network: "base-sepolia".to_string(),
        payload: ExactPayload {
            signature: "0x00".to_string(),
            authorization: TransferAuthorization {
                from: "0xPayer".to_string(),
                to: "0xReceiver".to_string(),
                value: "1000".to_string(),
                valid_after: 1,
                valid_before: 2,
                nonce: B256::repeat_byte(9),
            },
        },
    }
}

#[tokio::test]
async fn test_posts_to_verify_with_hmac() {
    let (url, server) = one_shot_server(
        "200 OK",
        r#"{"isValid":true,"payer":"0xPayer"}"#,
    )
    .await;
    let facilitator = HttpFacilitator::new(url).with_hmac_secret("shared");
    let verdict = facilitator.verify(&payload(), &requirements()).await.unwrap();
    assert!(verdict.is_valid);
    assert_eq!(verdict.payer.as_deref(), Some("0xPayer"));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /verify "));
    let (head, body) = request.split_once("\r\n\r\n").unwrap();
    let mac = head
        .lines()
        .find_map(|l| l.strip_prefix("x-facilitator-auth: "))
        .expect("auth header present");
    assert_eq!(mac, compute_hmac(b"shared", body.as_bytes()));

    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["x402Version"], 1);
    assert_eq!(json["paymentRequirements"]["maxAmountRequired"], "1000");
    assert_eq!(json["paymentPayload"]["payload"]["authorization"]["to"], "0xReceiver");
}

#[tokio::test]
async fn test_invalid_verdict_passes_through() {
    let (url, _server) = one_shot_server(
        "200 OK",
        r#"{"isValid":false,"invalidReason":"insufficient_funds"}"#,
    )
    .await;
    let verdict = HttpFacilitator::new(url)
        .verify(&payload(), &requirements())
        .await
        .unwrap();
    assert!(!verdict.is_valid);
    assert_eq!(verdict.invalid_reason.as_deref(), Some("insufficient_funds"));
}

#[tokio::test]
async fn test_server_error_fails_closed() {
    let (url, _server) = one_shot_server("500 Internal Server Error", r#"{"isValid":true}"#).await;
    let err = HttpFacilitator::new(url)
        .verify(&payload(), &requirements())
        .await
        .unwrap_err();
    assert!(matches!(err, X402Error::FacilitatorUnavailable(_)));
}

#[tokio::test]
async fn test_unauthorized_fails_closed() {
    let (url, _server) = one_shot_server("401 Unauthorized", "{}").await;
    let err = HttpFacilitator::new(url)
        .verify(&payload(), &requirements())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("authentication failed"));
}

#[tokio::test]
async fn test_garbage_body_fails_closed() {
    let (url, _server) = one_shot_server("200 OK", "not json").await;
    let err = HttpFacilitator::new(url)
        .verify(&payload(), &requirements())
        .await
        .unwrap_err();
    assert!(matches!(err, X402Error::FacilitatorUnavailable(_)));
}

#[tokio::test]
async fn test_unreachable_fails_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let err = HttpFacilitator::new(url)
        .verify(&payload(), &requirements())
        .await
        .unwrap_err();
    assert!(matches!(err, X402Error::FacilitatorUnavailable(_)));
}
