use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Histogram bucket boundaries for store round-trip latency (seconds).
const STORE_LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros (`counter!`,
/// `histogram!`) can be used anywhere in the crate. The `PrometheusHandle`
/// is retained solely for rendering the devops `/metrics` endpoint.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric descriptions.
    /// Must be called **once** at startup before any `counter!` / `histogram!`
    /// calls.
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
                STORE_LATENCY_BUCKETS,
            )
            .expect("valid matcher")
            .install_recorder()
            .expect("failed to install metrics recorder");

        describe_counter!(
            "rate_limit_hits_total",
            Unit::Count,
            "Total hit() calls by outcome"
        );
        describe_counter!(
            "rate_limit_throttles_total",
            Unit::Count,
            "Total hit() calls that resulted in a throttle, by source"
        );
        describe_counter!(
            "rate_limit_cooldowns_installed_total",
            Unit::Count,
            "Total cooldown keys written by refresh()"
        );
        describe_counter!(
            "rate_limit_blind_requests_total",
            Unit::Count,
            "Total hit() calls admitted blind because no policy was known yet"
        );
        describe_counter!(
            "rate_limit_policy_bootstraps_total",
            Unit::Count,
            "Total first-observation policy writes"
        );
        describe_histogram!(
            "rate_limit_store_round_trip_duration_seconds",
            Unit::Seconds,
            "Latency of a single store round trip (pool acquire + command)"
        );

        Self { handle }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Record one Redis round trip (pool acquire through command completion)
/// against `rate_limit_store_round_trip_duration_seconds`, labeled by the
/// operation that made it.
pub fn record_store_round_trip(op: &'static str, elapsed: Duration) {
    metrics::histogram!(
        "rate_limit_store_round_trip_duration_seconds",
        "op" => op,
    )
    .record(elapsed.as_secs_f64());
}
