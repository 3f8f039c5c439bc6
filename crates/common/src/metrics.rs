use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ukv_operations_total",
        "Key/value operations by operation and outcome",
        &["operation", "outcome"]
    )
    .expect("register ukv_operations_total")
});

pub static OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ukv_operation_duration_seconds",
        "Key/value operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("register ukv_operation_duration_seconds")
});

/// Record one finished operation.
pub fn observe(operation: &str, outcome: &str, elapsed_secs: f64) {
    OPERATIONS_TOTAL.with_label_values(&[operation, outcome]).inc();
    OPERATION_DURATION.with_label_values(&[operation]).observe(elapsed_secs);
}

/// Encode the default registry in the Prometheus text format.
pub fn encode_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("metrics encode error: {e}"))?;
    String::from_utf8(buffer).map_err(|e| format!("metrics encode error: {e}"))
}
