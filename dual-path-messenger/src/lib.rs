//! Dual-path messenger for near-RT RIC xApps
//!
//! Delivers messages over a primary message bus and falls back to HTTP when
//! the bus is unavailable:
//! - Per-path health tracking with consecutive success/failure streaks
//! - Automatic failover with hysteresis (distinct failover and recovery thresholds)
//! - Background health probing of both paths
//! - Optional handler for messages arriving on the primary bus
//! - Observability via Prometheus metrics
//!
//! # Invariants
//!
//! - Exactly one path is active at any time; Primary is preferred
//! - A path's failure and success streaks are never both non-zero
//! - Every send attempt and every probe produces exactly one health sample
//! - Transport errors never cross [`Messenger::send`]; callers get a `bool`

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod failover;
pub mod health;
mod health_loop;
pub mod http;
mod inbound;
pub mod messenger;
pub mod metrics;
pub mod nats;
pub mod registry;
pub mod transport;
pub mod types;

// Re-exports
pub use config::MessengerConfig;
pub use error::{Error, Result};
pub use failover::{FailoverController, FailoverEvent};
pub use health::{PathHealthMetrics, PathHealthTracker};
pub use http::{HttpTransport, HttpTransportConfig};
pub use messenger::{HealthSummary, Messenger, PathSummary};
pub use metrics::Metrics;
pub use nats::{NatsBus, NatsBusConfig};
pub use registry::EndpointRegistry;
pub use transport::{MessageHandler, PrimaryBus, PrimaryTransport, Transport};
pub use types::{CommunicationPath, EndpointConfig, Message, PathStatus, Payload};
