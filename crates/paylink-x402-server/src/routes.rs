use actix_web::{web, HttpRequest, HttpResponse};
use subtle::ConstantTimeEq;
use url::Url;
use x402::{Facilitator, PAYMENT_RESPONSE_HEADER};

use crate::error::ServerError;
use crate::metrics::{metrics_output, LINKS_CREATED};
use crate::middleware::require_payment;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShortUrl {
    #[serde(default)]
    pub original_url: Option<String>,
}

/// Register every route for a server verifying through `F`.
pub fn configure<F: Facilitator + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/api/create-short-url",
        web::post().to(create_short_url::<F>),
    )
    .route("/api/redirect/{code}", web::get().to(redirect::<F>))
    .route("/health", web::get().to(health::<F>))
    .route("/metrics", web::get().to(metrics_endpoint::<F>));
}

/// Accept absolute http(s) URLs only. Returns the trimmed input unchanged.
fn validate_target(original_url: Option<&str>) -> Result<String, ServerError> {
    let raw = original_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::InvalidUrl("originalUrl is required".to_string()))?;
    let url = Url::parse(raw).map_err(|e| ServerError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ServerError::InvalidUrl(format!(
            "only http and https URLs can be shortened: {raw}"
        )));
    }
    Ok(raw.to_string())
}

/// `POST /api/create-short-url`: paid. The target is validated before the
/// payment gate so a bad request never costs the caller a payment.
pub async fn create_short_url<F: Facilitator + 'static>(
    req: HttpRequest,
    body: web::Json<CreateShortUrl>,
    state: web::Data<AppState<F>>,
) -> Result<HttpResponse, ServerError> {
    let original_url = validate_target(body.original_url.as_deref())?;

    let paid = match require_payment(&req, &state.terms, &state.verifier).await {
        Ok(paid) => paid,
        Err(response) => return Ok(response),
    };

    let link = state
        .links
        .create_link(&original_url, &paid.payment)
        .inspect_err(|e| {
            tracing::error!(
                error = %e,
                payer = %paid.payment.payer,
                "payment accepted but link could not be stored"
            );
            // Nothing was delivered, so the authorization stays spendable.
            state.verifier.release(&paid.payment);
        })?;
    LINKS_CREATED.inc();

    let confirmation = paid
        .payment
        .payment_response()
        .encode()
        .map_err(|e| ServerError::Internal(format!("failed to encode payment response: {e}")))?;

    tracing::info!(
        short_code = %link.short_code,
        payer = %link.payer,
        "short link created"
    );

    Ok(HttpResponse::Ok()
        .insert_header((PAYMENT_RESPONSE_HEADER, confirmation))
        .json(serde_json::json!({
            "success": true,
            "shortUrl": format!("{}/{}", state.base_url, link.short_code),
            "shortCode": link.short_code,
            "originalUrl": link.original_url,
            "payment": {
                "verified": true,
                "receiver": link.receiver,
                "amount": link.amount,
                "asset": paid.requirements.asset,
                "network": link.network,
                "payer": link.payer,
            }
        })))
}

/// `GET /api/redirect/{code}`: free lookup of a stored link.
pub async fn redirect<F: Facilitator + 'static>(
    path: web::Path<String>,
    state: web::Data<AppState<F>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    let link = state
        .links
        .find(&code)?
        .ok_or(ServerError::NotFound(code))?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "originalUrl": link.original_url
    })))
}

pub async fn health<F: Facilitator + 'static>(
    state: web::Data<AppState<F>>,
) -> Result<HttpResponse, ServerError> {
    let links = state.links.count()?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "paylink-server",
        "network": state.terms.network.network,
        "payTo": state.terms.pay_to,
        "price": state.terms.amount,
        "links": links,
    })))
}

pub async fn metrics_endpoint<F: Facilitator + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<F>>,
) -> HttpResponse {
    match &state.metrics_token {
        Some(token) => {
            let authorized = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| bool::from(t.as_bytes().ct_eq(token)))
                .unwrap_or(false);

            if !authorized {
                return HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None => {
            if !state.public_metrics {
                return HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "forbidden",
                    "message": "Set METRICS_TOKEN or PUBLIC_METRICS=true to access /metrics"
                }));
            }
        }
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics_output())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_target() {
        assert!(validate_target(Some("https://example.com/a?b=c")).is_ok());
        assert!(validate_target(Some("http://localhost:8080")).is_ok());
        for bad in [
            None,
            Some(""),
            Some("example.com"),
            Some("ftp://example.com"),
            Some("javascript:alert(1)"),
        ] {
            assert!(
                matches!(validate_target(bad), Err(ServerError::InvalidUrl(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
