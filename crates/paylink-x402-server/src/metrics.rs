use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use std::sync::LazyLock;

pub static REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "paylink_requests_total",
        "Total HTTP requests to payment-gated routes",
        &["endpoint", "status"]
    )
    .unwrap()
});

/// `result` is one of `required`, `malformed`, `rejected`, `unavailable`, `success`.
pub static PAYMENT_ATTEMPTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "paylink_payment_attempts_total",
        "Payment gate outcomes",
        &["result"]
    )
    .unwrap()
});

pub static LINKS_CREATED: LazyLock<prometheus::IntCounter> = LazyLock::new(|| {
    prometheus::register_int_counter!("paylink_links_created_total", "Short links created")
        .unwrap()
});

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
