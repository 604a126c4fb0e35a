use alloy::primitives::U256;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use x402::{BASE_SEPOLIA_CHAIN_ID, DEFAULT_MAX_VALUE};
use x402_client::{LocalWallet, OutboundRequest, X402Client};

const USAGE: &str = "usage: x402-client <url> [json-body]";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let url = args.next().ok_or(USAGE)?;
    let body = args.next();

    let key = std::env::var("PRIVATE_KEY").map_err(|_| "PRIVATE_KEY must be set")?;
    let chain_id = match std::env::var("CHAIN_ID") {
        Ok(v) => v.parse::<u64>().map_err(|e| format!("invalid CHAIN_ID: {e}"))?,
        Err(_) => BASE_SEPOLIA_CHAIN_ID,
    };
    let max_value = match std::env::var("MAX_VALUE") {
        Ok(v) => v
            .parse::<U256>()
            .map_err(|e| format!("invalid MAX_VALUE: {e}"))?,
        Err(_) => U256::from(DEFAULT_MAX_VALUE),
    };

    let wallet = LocalWallet::from_private_key(&key, chain_id)?;
    tracing::info!(address = %wallet.signer_address(), chain_id, %max_value, "wallet loaded");

    let request = match body {
        Some(raw) => {
            let json: serde_json::Value =
                serde_json::from_str(&raw).map_err(|e| format!("body is not JSON: {e}"))?;
            OutboundRequest::post_json(&url, &json)?
        }
        None => OutboundRequest::get(&url),
    };

    let client = X402Client::new()?.with_max_value(max_value);
    let paid = client.fetch(&wallet, &request).await?;

    println!("status: {}", paid.response.status);
    if let Some(payment) = &paid.payment {
        println!("payment: {}", serde_json::to_string(payment)?);
    }
    println!("{}", paid.response.text());

    if !paid.response.is_success() {
        return Err(format!("request failed with status {}", paid.response.status).into());
    }
    Ok(())
}
