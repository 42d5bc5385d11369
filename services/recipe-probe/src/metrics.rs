//! Prometheus metrics exposition
//!
//! Installs the recorder for the metrics emitted by the dispatch crate:
//!
//! - `client_requests_total` (counter): labels `client`, `method`, `outcome`
//! - `client_request_duration_seconds` (histogram): label `client`
//! - `client_duplicate_requests_total` (counter): labels `client`, `method`
//! - `client_token_refresh_total` (counter): label `outcome`
//! - `client_refresh_waiters` (gauge)

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Bucket boundaries from 5ms to 60s, covering the configurable request timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("client_request_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder globally and return a handle for rendering.
///
/// `client_request_duration_seconds` is configured with explicit buckets so it
/// renders as a histogram (`_bucket` lines) rather than a summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}
