use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec, TextEncoder,
};

// Metrics registry
static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap()
});

static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0, 5.0]
    )
    .unwrap()
});

static GUEST_CODE_VERIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "guest_code_verifications_total",
        "Guest code verification attempts by outcome",
        &["outcome"]
    )
    .unwrap()
});

static ACCESS_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "access_events_total",
        "Access log rows appended",
        &["result", "method"]
    )
    .unwrap()
});

static VISIT_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "visit_transitions_total",
        "Visit state transitions applied",
        &["transition"]
    )
    .unwrap()
});

static NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "notifications_total",
        "Real-time pushes by event and delivery outcome",
        &["event", "push"]
    )
    .unwrap()
});

pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn record_http_request(method: &str, path: &str, status: u16) {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
    }

    pub fn record_http_duration(method: &str, path: &str, duration: f64) {
        HTTP_REQUEST_DURATION
            .with_label_values(&[method, path])
            .observe(duration);
    }

    /// `outcome` is `success`, `not_found` or `expired`.
    pub fn record_guest_code_verification(outcome: &str) {
        GUEST_CODE_VERIFICATIONS_TOTAL
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_access_event(result: &str, method: &str) {
        ACCESS_EVENTS_TOTAL.with_label_values(&[result, method]).inc();
    }

    pub fn record_visit_transition(transition: &str) {
        VISIT_TRANSITIONS_TOTAL
            .with_label_values(&[transition])
            .inc();
    }

    pub fn record_push(event: &str, delivered: bool) {
        let push = if delivered { "delivered" } else { "failed" };
        NOTIFICATIONS_TOTAL.with_label_values(&[event, push]).inc();
    }

    /// Export all metrics in Prometheus format
    pub fn export() -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        encoder.encode_to_string(&metric_families)
    }
}
