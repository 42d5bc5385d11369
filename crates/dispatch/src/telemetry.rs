//! Dispatch metrics
//!
//! Recorded through the `metrics` facade; the binary decides which recorder
//! (if any) is installed.
//!
//! - `client_requests_total` (counter): labels `client`, `method`, `outcome`
//! - `client_request_duration_seconds` (histogram): label `client`
//! - `client_duplicate_requests_total` (counter): labels `client`, `method`
//! - `client_token_refresh_total` (counter): label `outcome`
//! - `client_refresh_waiters` (gauge)

use transport::Method;

pub(crate) fn record_request(
    client: &'static str,
    method: &Method,
    outcome: &'static str,
    duration_secs: f64,
) {
    metrics::counter!(
        "client_requests_total",
        "client" => client,
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("client_request_duration_seconds", "client" => client)
        .record(duration_secs);
}

pub(crate) fn record_duplicate(client: &'static str, method: &Method) {
    metrics::counter!(
        "client_duplicate_requests_total",
        "client" => client,
        "method" => method.to_string()
    )
    .increment(1);
}

pub(crate) fn record_refresh(outcome: &'static str) {
    metrics::counter!("client_token_refresh_total", "outcome" => outcome).increment(1);
}

pub(crate) fn set_refresh_waiters(waiting: usize) {
    metrics::gauge!("client_refresh_waiters").set(waiting as f64);
}
