use actix_web::HttpResponse;
use x402::{PaymentRequiredBody, PaymentRequirements, X402_VERSION};

pub const PAYMENT_REQUIRED_ERROR: &str = "Payment required";

/// Build the 402 Payment Required response body.
pub fn payment_required_body(requirements: PaymentRequirements) -> PaymentRequiredBody {
    PaymentRequiredBody {
        x402_version: X402_VERSION,
        accepts: vec![requirements],
        error: PAYMENT_REQUIRED_ERROR.to_string(),
    }
}

pub fn payment_required(requirements: PaymentRequirements) -> HttpResponse {
    HttpResponse::PaymentRequired().json(payment_required_body(requirements))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_wire_shape() {
        let requirements = PaymentRequirements {
            scheme: "exact".to_string(),
            network: "base-sepolia".to_string(),
            max_amount_required: "1000".to_string(),
            resource: "http://localhost:3000/api/create-short-url".to_string(),
            description: "URL Shortening Service".to_string(),
            mime_type: "application/json".to_string(),
            pay_to: "0xReceiver".to_string(),
            max_timeout_seconds: 60,
            asset: "0xUSDC".to_string(),
            extra: None,
        };
        let json = serde_json::to_value(payment_required_body(requirements)).unwrap();
        assert_eq!(json["x402Version"], 1);
        assert_eq!(json["error"], "Payment required");
        assert_eq!(json["accepts"][0]["maxAmountRequired"], "1000");
        assert_eq!(json["accepts"][0]["payTo"], "0xReceiver");
        assert_eq!(json["accepts"][0]["maxTimeoutSeconds"], 60);
    }
}
