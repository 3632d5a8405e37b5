//! Prometheus Metrics
//!
//! Process-wide collectors registered on the default registry and rendered
//! by the `/metrics` endpoint.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

/// Text-generation round trips by outcome ("ok" / "error")
pub static GATEWAY_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "loadmatch_gateway_requests_total",
        "Text-generation requests by outcome",
        &["outcome"]
    )
    .expect("gateway request counter registers once")
});

/// Replies that could not be decoded into the requested verdict shape
pub static UNPARSEABLE_REPLIES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "loadmatch_gateway_unparseable_replies_total",
        "Gateway replies rejected by the JSON parser"
    )
    .expect("unparseable reply counter registers once")
});

/// Candidates skipped because evaluation failed, by scan
pub static CANDIDATE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "loadmatch_candidate_failures_total",
        "Candidates skipped after an evaluation failure",
        &["scan"]
    )
    .expect("candidate failure counter registers once")
});

/// Accepted suggestions by kind
pub static SUGGESTIONS_EMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "loadmatch_suggestions_emitted_total",
        "Suggestions accepted by the evaluator",
        &["kind"]
    )
    .expect("suggestion counter registers once")
});

pub static ASSIGNMENTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "loadmatch_assignments_total",
        "Cargo offers assigned to vehicles"
    )
    .expect("assignment counter registers once")
});

pub static AUDIT_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "loadmatch_audit_events_total",
        "Audit log appends by event type",
        &["event_type"]
    )
    .expect("audit counter registers once")
});

/// Wall-clock duration of planner scans
pub static SCAN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "loadmatch_scan_duration_seconds",
        "Planner scan duration",
        &["scan"],
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 180.0]
    )
    .expect("scan histogram registers once")
});

/// Render every registered metric in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_touched_collectors() {
        ASSIGNMENTS.inc();
        GATEWAY_REQUESTS.with_label_values(&["ok"]).inc();

        let text = render().unwrap();
        assert!(text.contains("loadmatch_assignments_total"));
        assert!(text.contains("loadmatch_gateway_requests_total"));
    }
}
