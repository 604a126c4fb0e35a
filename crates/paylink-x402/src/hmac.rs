//! HMAC-SHA256 request signing between a resource server and its facilitator.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex MAC of the request body.
pub const FACILITATOR_AUTH_HEADER: &str = "X-Facilitator-Auth";

fn keyed(secret: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length")
}

/// Hex-encoded HMAC-SHA256 of `body`.
pub fn compute_hmac(secret: &[u8], body: &[u8]) -> String {
    let mut mac = keyed(secret);
    mac.update(body);
    alloy::hex::encode(mac.finalize().into_bytes())
}
