use actix_web::{HttpRequest, HttpResponse};
use x402::{
    ErrorKind, Facilitator, PaymentRequirements, PaymentVerifier, VerifiedPayment, X402Error,
    PAYMENT_HEADER,
};

use crate::challenge::payment_required;
use crate::config::PaymentTerms;
use crate::metrics::{PAYMENT_ATTEMPTS, REQUESTS};

pub const INVALID_PAYMENT_ERROR: &str = "Invalid or expired payment proof";

/// A request whose payment was accepted.
#[derive(Debug, Clone)]
pub struct PaidRequest {
    pub payment: VerifiedPayment,
    /// Descriptor the payment was checked against.
    pub requirements: PaymentRequirements,
}

/// Read the raw `X-PAYMENT` header. A value that is not visible ASCII is
/// reported as malformed rather than missing.
pub fn payment_header(req: &HttpRequest) -> Option<Result<&str, X402Error>> {
    req.headers().get(PAYMENT_HEADER).map(|v| {
        v.to_str()
            .map_err(|_| X402Error::MalformedHeader("header is not ASCII".to_string()))
    })
}

/// Response for a gate failure. Format errors are the caller's fault (400);
/// everything else means the payment did not buy access (403).
pub fn rejection_response(err: &X402Error) -> HttpResponse {
    match err.kind() {
        ErrorKind::Format => HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Malformed payment header",
            "code": err.code(),
            "reason": err.to_string()
        })),
        _ => HttpResponse::Forbidden().json(serde_json::json!({
            "error": INVALID_PAYMENT_ERROR,
            "code": err.code(),
            "reason": err.to_string()
        })),
    }
}

/// Payment gate for one protected action.
///
/// Returns the verified payment, or the response to send instead: 402 with a
/// fresh challenge when no header is present, 400 for an undecodable header,
/// 403 when the facilitator rejects the payment or cannot be reached.
pub async fn require_payment<F: Facilitator>(
    req: &HttpRequest,
    terms: &PaymentTerms,
    verifier: &PaymentVerifier<F>,
) -> Result<PaidRequest, HttpResponse> {
    // Use the matched route pattern (not raw path) to keep label cardinality bounded
    let endpoint_label = req.match_pattern().unwrap_or_else(|| "unknown".to_string());
    let requirements = terms.requirements_for(req);

    let raw = match payment_header(req) {
        None => {
            PAYMENT_ATTEMPTS.with_label_values(&["required"]).inc();
            REQUESTS
                .with_label_values(&[endpoint_label.as_str(), "402"])
                .inc();
            return Err(payment_required(requirements));
        }
        Some(raw) => raw,
    };

    let result = match raw {
        Ok(raw) => verifier.verify_header(raw, &requirements).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(payment) => {
            PAYMENT_ATTEMPTS.with_label_values(&["success"]).inc();
            REQUESTS
                .with_label_values(&[endpoint_label.as_str(), "200"])
                .inc();
            tracing::info!(
                payer = %payment.payer,
                amount = %payment.amount,
                network = %payment.network,
                nonce = %format!("{:.8}", payment.nonce()),
                "payment accepted"
            );
            Ok(PaidRequest {
                payment,
                requirements,
            })
        }
        Err(e) => {
            let (result, status) = match &e {
                e if e.kind() == ErrorKind::Format => ("malformed", "400"),
                X402Error::FacilitatorUnavailable(_) => ("unavailable", "403"),
                _ => ("rejected", "403"),
            };
            PAYMENT_ATTEMPTS.with_label_values(&[result]).inc();
            REQUESTS
                .with_label_values(&[endpoint_label.as_str(), status])
                .inc();
            match result {
                "unavailable" => tracing::error!(error = %e, "facilitator communication error"),
                _ => tracing::warn!(code = e.code(), error = %e, "payment not accepted"),
            }
            Err(rejection_response(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::test::TestRequest;

    #[test]
    fn test_missing_header_is_none() {
        let req = TestRequest::post().to_http_request();
        assert!(payment_header(&req).is_none());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let req = TestRequest::post()
            .insert_header(("x-payment", "abc"))
            .to_http_request();
        assert_eq!(payment_header(&req).unwrap().unwrap(), "abc");
    }

    #[actix_rt::test]
    async fn test_format_error_is_400() {
        let resp = rejection_response(&X402Error::MalformedHeader("invalid base64".into()));
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(resp.into_body()).await.unwrap()).unwrap();
        assert_eq!(body["code"], "malformed_header");
    }

    #[actix_rt::test]
    async fn test_verification_and_outage_are_403() {
        for err in [
            X402Error::VerificationFailed("nonce already used".into()),
            X402Error::FacilitatorUnavailable("timeout".into()),
        ] {
            let resp = rejection_response(&err);
            assert_eq!(resp.status(), 403);
            let body: serde_json::Value =
                serde_json::from_slice(&to_bytes(resp.into_body()).await.unwrap()).unwrap();
            assert_eq!(body["error"], INVALID_PAYMENT_ERROR);
            assert_eq!(body["code"], err.code());
        }
    }
}
