//! Telemetry logic.
//! Support logging and metrics.
use std::time::Instant;

use metrics::Unit;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const OPERATIONS_TOTAL: &str = "directory_operations_total";
const OPERATION_DURATION: &str = "directory_operation_duration_seconds";

/// Install a formatting subscriber filtered by `filter`, e.g.
/// `ad_entries=debug`. `RUST_LOG` wins when set.
pub fn setup_tracing(filter: &str) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Create recorder for Prometheus metrics.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    metrics::describe_counter!(
        OPERATIONS_TOTAL,
        Unit::Count,
        "Directory operations by name and status."
    );
    metrics::describe_histogram!(
        OPERATION_DURATION,
        Unit::Seconds,
        "Duration of directory operations, binding included."
    );

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(OPERATION_DURATION.to_string()),
            EXPONENTIAL_SECONDS,
        )?
        .install_recorder()
}

/// Record outcome and latency of one operation.
pub(crate) fn track<T, E>(
    operation: &'static str,
    start: Instant,
    result: &Result<T, E>,
) {
    let status = if result.is_ok() { "ok" } else { "error" };

    let labels = [("operation", operation.to_string()), ("status", status.to_string())];
    metrics::counter!(OPERATIONS_TOTAL, &labels).increment(1);
    metrics::histogram!(OPERATION_DURATION, "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}
