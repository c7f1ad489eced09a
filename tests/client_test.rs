//! Immediate Emission Tests
//!
//! `MetricsClient` writes one line per call, stamped at call time.

use std::time::Duration;

use lambda_dd_metrics::metrics::{LineEmitter, ManualClock, MetricsClient, MetricsError};
use rust_decimal_macros::dec;

fn client(group: Option<&str>) -> MetricsClient<LineEmitter<Vec<u8>, ManualClock>> {
    MetricsClient::with_emitter(
        "test",
        group,
        LineEmitter::new(Vec::new(), ManualClock::new(1234)),
    )
}

#[test]
fn test_incr() {
    let line = client(None).incr("test_metric", &[]).unwrap();
    assert_eq!(line, "MONITORING|1234|1|count|test.test_metric");
}

#[test]
fn test_incr_with_tag() {
    let line = client(None).incr("test_metric", &["tag"]).unwrap();
    assert_eq!(line, "MONITORING|1234|1|count|test.test_metric|#tag");
}

#[test]
fn test_incr_with_tags() {
    let line = client(None).incr("test_metric", &["tag1", "tag2"]).unwrap();
    assert_eq!(line, "MONITORING|1234|1|count|test.test_metric|#tag1,tag2");
}

#[test]
fn test_incr_with_stats_group() {
    let line = client(Some("test_group")).incr("test_metric", &[]).unwrap();
    assert_eq!(line, "MONITORING|1234|1|count|test.test_metric|#group:test_group");
}

#[test]
fn test_incr_with_count() {
    let line = client(None).increment("test_metric", 5, &[]).unwrap();
    assert_eq!(line, "MONITORING|1234|5|count|test.test_metric");
}

#[test]
fn test_gauge() {
    let line = client(None).gauge("test_metric", 1, &[]).unwrap();
    assert_eq!(line, "MONITORING|1234|1|gauge|test.test_metric");
}

#[test]
fn test_gauge_decimal() {
    let line = client(None).gauge("cpu", dec!(75.5), &["host:web01"]).unwrap();
    assert_eq!(line, "MONITORING|1234|75.5|gauge|test.cpu|#host:web01");
}

#[test]
fn test_histogram() {
    let line = client(None).histogram("test_metric", 1, &[]).unwrap();
    assert_eq!(line, "MONITORING|1234|1|histogram|test.test_metric");
}

#[test]
fn test_timing() {
    let line = client(None)
        .timing("test_metric", Duration::from_millis(1500), &[])
        .unwrap();
    assert_eq!(line, "MONITORING|1234|1.5|histogram|test.test_metric");
}

#[test]
fn test_time_returns_closure_result() {
    let client = client(None);
    let echoed = client.time("test_metric", &[], || "echo").unwrap();
    assert_eq!(echoed, "echo");
}

#[test]
fn test_duplicate_tags() {
    let err = client(None).incr("test_metric", &["t", "t"]).unwrap_err();
    assert!(matches!(err, MetricsError::InvalidTags(_)));
}
