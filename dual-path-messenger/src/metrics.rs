//! Prometheus metrics for the messenger
//!
//! One [`Metrics`] value is created per messenger and owns its own
//! [`Registry`]; nothing is registered in the process-wide default registry.
//!
//! # Metrics
//!
//! - `dual_path_messages_sent_total{path, message_type, destination}`
//! - `dual_path_messages_failed_total{path, message_type}` (`path="both"` for drops)
//! - `dual_path_messages_received_total{message_type, result}`
//! - `dual_path_path_health_status{path}` - 1 healthy, 0 otherwise
//! - `dual_path_active_path` - 1 primary, 0 fallback
//! - `dual_path_failover_events_total{from, to}`
//! - `dual_path_message_latency_seconds{path}`

use crate::failover::FailoverEvent;
use crate::types::{CommunicationPath, PathStatus};
use crate::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

const NAMESPACE: &str = "dual_path";

/// Label value for messages lost on both paths
pub const BOTH_PATHS: &str = "both";

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Delivered messages
    pub messages_sent: IntCounterVec,

    /// Failed attempts and drops
    pub messages_failed: IntCounterVec,

    /// Inbound messages by handler outcome
    pub messages_received: IntCounterVec,

    /// Per-path health gauge
    pub path_health_status: IntGaugeVec,

    /// Active path gauge
    pub active_path: IntGauge,

    /// Path switches
    pub failover_events: IntCounterVec,

    /// Delivery latency
    pub message_latency: HistogramVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let messages_sent = IntCounterVec::new(
            Opts::new("messages_sent_total", "Total messages delivered").namespace(NAMESPACE),
            &["path", "message_type", "destination"],
        )?;
        registry.register(Box::new(messages_sent.clone()))?;

        let messages_failed = IntCounterVec::new(
            Opts::new("messages_failed_total", "Total failed message deliveries")
                .namespace(NAMESPACE),
            &["path", "message_type"],
        )?;
        registry.register(Box::new(messages_failed.clone()))?;

        let messages_received = IntCounterVec::new(
            Opts::new("messages_received_total", "Total inbound messages handled")
                .namespace(NAMESPACE),
            &["message_type", "result"],
        )?;
        registry.register(Box::new(messages_received.clone()))?;

        let path_health_status = IntGaugeVec::new(
            Opts::new("path_health_status", "Path health (1=healthy, 0=unhealthy)")
                .namespace(NAMESPACE),
            &["path"],
        )?;
        registry.register(Box::new(path_health_status.clone()))?;

        let active_path = IntGauge::with_opts(
            Opts::new("active_path", "Active communication path (1=primary, 0=fallback)")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(active_path.clone()))?;

        let failover_events = IntCounterVec::new(
            Opts::new("failover_events_total", "Total number of path failover events")
                .namespace(NAMESPACE),
            &["from", "to"],
        )?;
        registry.register(Box::new(failover_events.clone()))?;

        let message_latency = HistogramVec::new(
            HistogramOpts::new("message_latency_seconds", "Message delivery latency")
                .namespace(NAMESPACE)
                .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 5.0]),
            &["path"],
        )?;
        registry.register(Box::new(message_latency.clone()))?;

        Ok(Self {
            messages_sent,
            messages_failed,
            messages_received,
            path_health_status,
            active_path,
            failover_events,
            message_latency,
            registry,
        })
    }

    /// Record a delivered message
    pub fn record_sent(&self, path: CommunicationPath, type_id: i32, destination: &str) {
        self.messages_sent
            .with_label_values(&[path.as_str(), &type_id.to_string(), destination])
            .inc();
    }

    /// Record a failed attempt on one path
    pub fn record_failed(&self, path: CommunicationPath, type_id: i32) {
        self.messages_failed
            .with_label_values(&[path.as_str(), &type_id.to_string()])
            .inc();
    }

    /// Record a message lost on both paths
    pub fn record_dropped(&self, type_id: i32) {
        self.messages_failed
            .with_label_values(&[BOTH_PATHS, &type_id.to_string()])
            .inc();
    }

    /// Record an inbound message and whether its handler succeeded
    pub fn record_received(&self, type_id: i32, handled: bool) {
        let result = if handled { "success" } else { "handler_error" };
        self.messages_received
            .with_label_values(&[&type_id.to_string(), result])
            .inc();
    }

    /// Record delivery latency
    pub fn record_latency(&self, path: CommunicationPath, seconds: f64) {
        self.message_latency
            .with_label_values(&[path.as_str()])
            .observe(seconds);
    }

    /// Update the health gauge for `path`
    pub fn set_path_status(&self, path: CommunicationPath, status: PathStatus) {
        let value = if status == PathStatus::Healthy { 1 } else { 0 };
        self.path_health_status
            .with_label_values(&[path.as_str()])
            .set(value);
    }

    /// Update the active path gauge
    pub fn set_active_path(&self, path: CommunicationPath) {
        let value = if path == CommunicationPath::Primary { 1 } else { 0 };
        self.active_path.set(value);
    }

    /// Record a path switch
    pub fn record_failover(&self, event: &FailoverEvent) {
        self.failover_events
            .with_label_values(&[event.from.as_str(), event.to.as_str()])
            .inc();
        self.set_active_path(event.to);
    }

    /// Drops for `type_id`
    pub fn dropped(&self, type_id: i32) -> u64 {
        self.messages_failed
            .with_label_values(&[BOTH_PATHS, &type_id.to_string()])
            .get()
    }

    /// Render in the Prometheus text exposition format
    pub fn gather_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
