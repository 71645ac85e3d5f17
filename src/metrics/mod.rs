//! Metrics for the order execution platform.
//!
//! Provides Prometheus-compatible metrics for monitoring:
//! - API request metrics (latency, count, errors)
//! - Matching engine metrics (orders, trades, latency)
//! - Risk pipeline metrics (validations, rejections)
//! - Lifecycle metrics (batch size, expiry)
//! - Distribution Bus metrics (connections, messages, backpressure)
//! - Persistence metrics (query latency)

#![allow(dead_code)]

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Metric names as constants for consistency
pub mod names {
    // API metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";

    // Matching engine metrics
    pub const ORDERS_SUBMITTED_TOTAL: &str = "orders_submitted_total";
    pub const ORDERS_MATCHED_TOTAL: &str = "orders_matched_total";
    pub const ORDERS_CANCELLED_TOTAL: &str = "orders_cancelled_total";
    pub const ORDER_MATCH_DURATION_SECONDS: &str = "order_match_duration_seconds";
    pub const TRADES_EXECUTED_TOTAL: &str = "trades_executed_total";
    pub const TRADE_VOLUME_TOTAL: &str = "trade_volume_total";
    pub const ORDERBOOK_DEPTH: &str = "orderbook_depth";
    pub const ORDERBOOK_QUARANTINED_TOTAL: &str = "orderbook_quarantined_total";

    // Risk pipeline metrics
    pub const RISK_VALIDATIONS_TOTAL: &str = "risk_validations_total";
    pub const RISK_REJECTIONS_TOTAL: &str = "risk_rejections_total";
    pub const RISK_VALIDATION_DURATION_SECONDS: &str = "risk_validation_duration_seconds";

    // Lifecycle metrics
    pub const ORDERS_BATCH_SIZE: &str = "orders_batch_size";
    pub const ORDERS_EXPIRED_TOTAL: &str = "orders_expired_total";
    pub const ORDERS_EVICTED_TOTAL: &str = "orders_evicted_total";
    pub const DUPLICATE_SUBMISSIONS_TOTAL: &str = "duplicate_submissions_total";

    // Distribution Bus metrics
    pub const BUS_CONNECTIONS_ACTIVE: &str = "bus_connections_active";
    pub const BUS_MESSAGES_SENT_TOTAL: &str = "bus_messages_sent_total";
    pub const BUS_MESSAGES_RECEIVED_TOTAL: &str = "bus_messages_received_total";
    pub const BUS_SLOW_CONSUMERS_DISCONNECTED_TOTAL: &str = "bus_slow_consumers_disconnected_total";

    // Persistence metrics
    pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";
    pub const DB_CONNECTIONS_ACTIVE: &str = "db_connections_active";
    pub const DB_CONNECTIONS_IDLE: &str = "db_connections_idle";
}

/// Label keys
pub mod labels {
    pub const METHOD: &str = "method";
    pub const ENDPOINT: &str = "endpoint";
    pub const STATUS: &str = "status";
    pub const SIDE: &str = "side";
    pub const ORDER_TYPE: &str = "order_type";
    pub const SYMBOL: &str = "symbol";
    pub const VALIDATOR: &str = "validator";
    pub const CHANNEL: &str = "channel";
    pub const QUERY_TYPE: &str = "query_type";
}

/// Initialize Prometheus metrics exporter
///
/// Returns a handle that can be used to render metrics
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::HTTP_REQUEST_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .unwrap()
        // Order matching is on the hot path and expected to stay sub-millisecond.
        .set_buckets_for_metric(
            Matcher::Full(names::ORDER_MATCH_DURATION_SECONDS.to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5],
        )
        .unwrap()
        .set_buckets_for_metric(
            Matcher::Full(names::RISK_VALIDATION_DURATION_SECONDS.to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1],
        )
        .unwrap()
        .set_buckets_for_metric(
            Matcher::Full(names::DB_QUERY_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0],
        )
        .unwrap();

    builder.install_recorder().expect("failed to install prometheus recorder")
}

// ============================================================================
// HTTP metrics
// ============================================================================

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status_str.clone()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status_str
    )
    .record(duration_secs);
}

pub fn set_http_requests_in_flight(count: i64) {
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).set(count as f64);
}

// ============================================================================
// Matching engine metrics
// ============================================================================

pub fn record_order_submitted(symbol: &str, side: &str, order_type: &str) {
    counter!(
        names::ORDERS_SUBMITTED_TOTAL,
        labels::SYMBOL => symbol.to_string(),
        labels::SIDE => side.to_string(),
        labels::ORDER_TYPE => order_type.to_string()
    )
    .increment(1);
}

pub fn record_order_matched(symbol: &str) {
    counter!(names::ORDERS_MATCHED_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
}

pub fn record_order_cancelled(symbol: &str) {
    counter!(names::ORDERS_CANCELLED_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
}

pub fn record_order_match_duration(duration_secs: f64) {
    histogram!(names::ORDER_MATCH_DURATION_SECONDS).record(duration_secs);
}

pub fn record_trade_executed(symbol: &str, volume: f64) {
    counter!(names::TRADES_EXECUTED_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
    counter!(names::TRADE_VOLUME_TOTAL, labels::SYMBOL => symbol.to_string()).increment(volume as u64);
}

pub fn set_orderbook_depth(symbol: &str, side: &str, depth: i64) {
    gauge!(
        names::ORDERBOOK_DEPTH,
        labels::SYMBOL => symbol.to_string(),
        labels::SIDE => side.to_string()
    )
    .set(depth as f64);
}

pub fn record_orderbook_quarantined(symbol: &str) {
    counter!(names::ORDERBOOK_QUARANTINED_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
}

// ============================================================================
// Risk pipeline metrics
// ============================================================================

pub fn record_risk_validation(validator: &str, duration_secs: f64) {
    counter!(names::RISK_VALIDATIONS_TOTAL, labels::VALIDATOR => validator.to_string()).increment(1);
    histogram!(names::RISK_VALIDATION_DURATION_SECONDS, labels::VALIDATOR => validator.to_string())
        .record(duration_secs);
}

pub fn record_risk_rejection(validator: &str) {
    counter!(names::RISK_REJECTIONS_TOTAL, labels::VALIDATOR => validator.to_string()).increment(1);
}

// ============================================================================
// Lifecycle metrics
// ============================================================================

pub fn record_batch_size(size: i64) {
    gauge!(names::ORDERS_BATCH_SIZE).set(size as f64);
}

pub fn record_order_expired() {
    counter!(names::ORDERS_EXPIRED_TOTAL).increment(1);
}

pub fn record_order_evicted() {
    counter!(names::ORDERS_EVICTED_TOTAL).increment(1);
}

pub fn record_duplicate_submission() {
    counter!(names::DUPLICATE_SUBMISSIONS_TOTAL).increment(1);
}

// ============================================================================
// Distribution Bus metrics
// ============================================================================

pub fn set_bus_connections(count: i64) {
    gauge!(names::BUS_CONNECTIONS_ACTIVE).set(count as f64);
}

pub fn record_bus_message_sent(channel: &str) {
    counter!(names::BUS_MESSAGES_SENT_TOTAL, labels::CHANNEL => channel.to_string()).increment(1);
}

pub fn record_bus_message_received() {
    counter!(names::BUS_MESSAGES_RECEIVED_TOTAL).increment(1);
}

pub fn record_bus_slow_consumer_disconnected() {
    counter!(names::BUS_SLOW_CONSUMERS_DISCONNECTED_TOTAL).increment(1);
}

// ============================================================================
// Persistence metrics
// ============================================================================

pub fn record_db_query(query_type: &str, duration_secs: f64) {
    histogram!(names::DB_QUERY_DURATION_SECONDS, labels::QUERY_TYPE => query_type.to_string()).record(duration_secs);
}

pub fn set_db_connections(active: i64, idle: i64) {
    gauge!(names::DB_CONNECTIONS_ACTIVE).set(active as f64);
    gauge!(names::DB_CONNECTIONS_IDLE).set(idle as f64);
}

// ============================================================================
// Timer helper
// ============================================================================

pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
