use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // HTTP
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // MongoDB
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Marketplace
    pub static ref COURSE_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "course_transitions_total",
        "Publish workflow transitions",
        &["transition"]
    )
    .unwrap();

    pub static ref ENROLLMENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "enrollments_total",
        "Ledger entries created",
        &["kind"]
    )
    .unwrap();

    pub static ref PAYMENT_CALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "payment_callbacks_total",
        "Payment confirmations and gateway callbacks",
        &["gateway", "result"]
    )
    .unwrap();

    pub static ref EMAILS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "emails_total",
        "Outbound emails",
        &["kind", "status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Times a database call and records its outcome.
pub async fn track_db_operation<F, T, E>(operation: &str, collection: &str, future: F) -> Result<T, E>
where
    F: std::future::IntoFuture<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();
    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

pub fn record_transition(transition: &str) {
    COURSE_TRANSITIONS_TOTAL
        .with_label_values(&[transition])
        .inc();
}

pub fn record_enrollment(kind: &str) {
    ENROLLMENTS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_payment_callback(gateway: &str, result: &str) {
    PAYMENT_CALLBACKS_TOTAL
        .with_label_values(&[gateway, result])
        .inc();
}

pub fn record_email(kind: &str, status: &str) {
    EMAILS_TOTAL.with_label_values(&[kind, status]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_db_operation_outcome() {
        let before = DB_OPERATIONS_TOTAL
            .with_label_values(&["find", "unit_test", "error"])
            .get();
        let result: Result<(), &str> =
            track_db_operation("find", "unit_test", async { Err("boom") }).await;
        assert!(result.is_err());
        let after = DB_OPERATIONS_TOTAL
            .with_label_values(&["find", "unit_test", "error"])
            .get();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_render_metrics() {
        record_transition("submit");
        record_payment_callback("vnpay", "bad_checksum");

        let output = render_metrics().unwrap();
        assert!(output.contains("course_transitions_total"));
        assert!(output.contains("payment_callbacks_total"));
    }
}
