use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use x402::{
    Facilitator, HttpFacilitator, InMemoryNonceStore, LocalFacilitator, NonceStore,
    PaymentVerifier, SqliteNonceStore,
};

use x402_server::{AppState, LinkStore, ServerConfig};

/// Nonces are kept well past any authorization window before purging.
const NONCE_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

fn build_cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        Cors::default()
            .allowed_origin_fn(|origin, _| {
                origin
                    .to_str()
                    .map(|o| o == "http://localhost" || o.starts_with("http://localhost:"))
                    .unwrap_or(false)
            })
            .allow_any_method()
            .allow_any_header()
            .expose_headers(["X-PAYMENT-RESPONSE"])
            .max_age(3600)
    } else {
        let mut cors = Cors::default();
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
        cors.allow_any_method()
            .allow_any_header()
            .expose_headers(["X-PAYMENT-RESPONSE"])
            .max_age(3600)
    }
}

async fn serve<F: Facilitator + 'static>(
    config: ServerConfig,
    facilitator: F,
    nonce_store: Arc<dyn NonceStore>,
    links: LinkStore,
) -> std::io::Result<()> {
    let verifier = PaymentVerifier::new(facilitator).with_nonce_store(nonce_store);
    let _cleanup = verifier.start_nonce_cleanup(NONCE_RETENTION);

    let state = web::Data::new(AppState {
        terms: config.payment_terms(),
        verifier,
        links,
        base_url: config.base_url.clone(),
        metrics_token: config.metrics_token.clone().map(String::into_bytes),
        public_metrics: config.public_metrics,
    });

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(config.rate_limit_rpm)
        .finish()
        .ok_or_else(|| std::io::Error::other("invalid rate limiter config"))?;

    let cors_origins = config.allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(web::JsonConfig::default().limit(65_536))
            .app_data(state.clone())
            .configure(x402_server::configure::<F>)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
        std::io::Error::other(e.to_string())
    })?;
    tracing::debug!(config = ?config, "loaded configuration");

    let links = LinkStore::open(&config.db_path).map_err(|e| {
        tracing::error!(error = %e, path = %config.db_path, "failed to open link database");
        std::io::Error::other(e.to_string())
    })?;
    let nonce_store: Arc<dyn NonceStore> = Arc::new(
        SqliteNonceStore::open(&config.nonce_db_path).map_err(|e| {
            tracing::error!(error = %e, path = %config.nonce_db_path, "failed to open nonce database");
            std::io::Error::other(e.to_string())
        })?,
    );

    tracing::info!("paylink server listening at http://localhost:{}", config.port);
    tracing::info!(
        "Charging {} ({} atomic units) on {} to {}",
        config.price,
        config.amount,
        config.network.network,
        config.pay_to
    );
    tracing::info!("Rate limit: {} req/min per IP", config.rate_limit_rpm);

    if config.local_facilitator {
        tracing::info!("Verifying payments in-process");
        // The facilitator keeps its own nonce record; the verifier's store is
        // claimed only after the facilitator accepts.
        let facilitator = LocalFacilitator::new(config.network.clone())
            .with_nonce_store(Arc::new(InMemoryNonceStore::new()));
        let _facilitator_cleanup = facilitator.start_nonce_cleanup(NONCE_RETENTION);
        serve(config, facilitator, nonce_store, links).await
    } else {
        let mut facilitator = HttpFacilitator::new(config.facilitator_url.clone());
        match &config.hmac_secret {
            Some(secret) => facilitator = facilitator.with_hmac_secret(secret.clone()),
            None => tracing::warn!(
                "FACILITATOR_SHARED_SECRET not set, facilitator requests will be unsigned"
            ),
        }
        tracing::info!("Facilitator: {}", facilitator.verify_url());
        serve(config, facilitator, nonce_store, links).await
    }
}
