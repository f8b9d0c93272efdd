//! Dual-path messenger facade
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        xApp handlers (many tasks)            │
//! └──────────────────────┬───────────────────────┘
//!                        │ send()
//!                        ▼
//! ┌──────────────────────────────────────────────┐      ┌─────────────────┐
//! │ Messenger (Clone)                            │      │ HealthCheckLoop │
//! │  Mutex<MessengerState>                       │◄─────┤ (one task)      │
//! │   ├─ PathHealthTracker                       │      └─────────────────┘
//! │   ├─ EndpointRegistry                        │      ┌─────────────────┐
//! │   └─ FailoverController (active path)        │◄─────┤ Inbound         │
//! └──────────┬──────────────────────┬────────────┘      │ dispatcher      │
//!            ▼                      ▼                   └────────▲────────┘
//!     PrimaryTransport        HttpTransport                      │
//!       (NATS bus) ──────────────────────────────────────────────┘
//! ```
//!
//! The state lock is only held for bookkeeping, never across a transport
//! call, so concurrent sends overlap on the network.

use crate::config::MessengerConfig;
use crate::failover::{FailoverController, FailoverEvent};
use crate::health::{PathHealthMetrics, PathHealthTracker};
use crate::health_loop::{check_once, HealthCheckLoop};
use crate::http::{HttpTransport, HttpTransportConfig};
use crate::inbound::InboundDispatcher;
use crate::metrics::Metrics;
use crate::nats::{NatsBus, NatsBusConfig};
use crate::registry::EndpointRegistry;
use crate::transport::{MessageHandler, PrimaryTransport, Transport};
use crate::types::{CommunicationPath, EndpointConfig, Message, PathStatus, Payload};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const INBOUND_QUEUE_DEPTH: usize = 1024;

/// Mutable state shared by senders and the health loop
#[derive(Debug)]
pub(crate) struct MessengerState {
    pub(crate) health: PathHealthTracker,
    pub(crate) registry: EndpointRegistry,
    pub(crate) failover: FailoverController,
}

impl MessengerState {
    fn new(config: &MessengerConfig) -> Self {
        let mut registry = EndpointRegistry::new();
        for endpoint in &config.endpoints {
            registry.register(endpoint.clone());
        }

        Self {
            health: PathHealthTracker::new(config.failover_threshold, config.recovery_threshold),
            registry,
            failover: FailoverController::new(config.recovery_threshold),
        }
    }
}

pub(crate) struct Shared {
    pub(crate) config: MessengerConfig,
    pub(crate) state: Mutex<MessengerState>,
    pub(crate) primary: Arc<dyn Transport>,
    pub(crate) fallback: Arc<dyn Transport>,
    pub(crate) metrics: Metrics,
}

impl Shared {
    fn transport(&self, path: CommunicationPath) -> &Arc<dyn Transport> {
        match path {
            CommunicationPath::Primary => &self.primary,
            CommunicationPath::Fallback => &self.fallback,
        }
    }

    /// Record one health sample
    pub(crate) fn record(&self, path: CommunicationPath, success: bool) {
        let status = self.state.lock().health.record(path, success);
        self.metrics.set_path_status(path, status);
    }

    /// Run the failover controller; the only place the active path changes
    pub(crate) fn evaluate(&self) -> Option<FailoverEvent> {
        let event = {
            let mut state = self.state.lock();
            let MessengerState {
                health, failover, ..
            } = &mut *state;
            failover.evaluate(health)
        };

        if let Some(event) = &event {
            self.metrics.record_failover(event);
            info!("Active communication path: {}", event.to);
        }
        event
    }
}

/// Per-path part of the health summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSummary {
    /// Derived status
    pub status: PathStatus,
    /// Last successful sample
    pub last_success: Option<DateTime<Utc>>,
    /// Last failed sample
    pub last_failure: Option<DateTime<Utc>>,
    /// Successful samples
    pub total_sent: u64,
    /// Failed samples
    pub total_failed: u64,
}

impl From<&PathHealthMetrics> for PathSummary {
    fn from(metrics: &PathHealthMetrics) -> Self {
        Self {
            status: metrics.status,
            last_success: metrics.last_success_time,
            last_failure: metrics.last_failure_time,
            total_sent: metrics.total_sent,
            total_failed: metrics.total_failed,
        }
    }
}

/// Consistent read-only snapshot of the messenger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    /// Currently active path
    pub active_path: CommunicationPath,
    /// Primary path health
    pub primary: PathSummary,
    /// Fallback path health
    pub fallback: PathSummary,
    /// Registered endpoint names, sorted
    pub endpoints: Vec<String>,
}

impl HealthSummary {
    /// JSON form for dashboards
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Default)]
struct Lifecycle {
    handler: Option<Arc<dyn MessageHandler>>,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
    inbound: Option<JoinHandle<()>>,
    starting: bool,
    stopped: bool,
}

/// Dual-path messenger
///
/// Cheap to clone; all clones share one state, one set of transports and
/// one health loop.
#[derive(Clone)]
pub struct Messenger {
    shared: Arc<Shared>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl Messenger {
    /// Create messenger with the NATS primary bus and the HTTP fallback
    pub fn new(config: MessengerConfig) -> Result<Self> {
        config.validate()?;

        let primary = PrimaryTransport::new(NatsBus::new(NatsBusConfig {
            url: config.primary_url.clone(),
            client_name: config.xapp_name.clone(),
            subject_prefix: config.subject_prefix.clone(),
            publish_timeout: config.ready_timeout(),
        }));

        let fallback = HttpTransport::new(HttpTransportConfig {
            xapp_name: config.xapp_name.clone(),
            send_timeout: config.fallback_timeout(),
            probe_timeout: config.health_probe_timeout(),
            max_attempts: config.max_retry_attempts,
            retry_delay: config.retry_delay(),
        })?;

        Self::with_transports(config, Arc::new(primary), Arc::new(fallback))
    }

    /// Create messenger over caller-supplied transports
    pub fn with_transports(
        config: MessengerConfig,
        primary: Arc<dyn Transport>,
        fallback: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;

        if primary.path() != CommunicationPath::Primary
            || fallback.path() != CommunicationPath::Fallback
        {
            return Err(Error::Config(
                "transports must serve the primary and fallback paths respectively".into(),
            ));
        }

        let metrics = Metrics::new()?;
        let state = MessengerState::new(&config);

        info!("DualPathMessenger initialized for xApp: {}", config.xapp_name);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(state),
                primary,
                fallback,
                metrics,
            }),
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
        })
    }

    /// Register (or replace) a fallback endpoint
    pub fn register_endpoint(&self, endpoint: EndpointConfig) {
        self.shared.state.lock().registry.register(endpoint);
    }

    /// Install the handler for messages arriving on the primary bus. Takes
    /// effect on the next [`start`](Self::start); without a handler the
    /// messenger does not subscribe.
    pub fn set_message_handler<H>(&self, handler: Arc<H>)
    where
        H: MessageHandler + 'static,
    {
        self.lifecycle.lock().handler = Some(handler);
    }

    /// Connect transports, wait up to `ready_timeout` for the primary bus and
    /// spawn the health loop (and the inbound dispatcher when a handler is
    /// installed). A call while another start is in progress or the
    /// messenger is running is a no-op. Returns [`Error::Closed`] if the
    /// messenger was stopped, including by a `stop()` that raced this call.
    pub async fn start(&self) -> Result<()> {
        let handler = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.stopped {
                return Err(Error::Closed);
            }
            if lifecycle.handle.is_some() || lifecycle.starting {
                warn!("DualPathMessenger already running");
                return Ok(());
            }
            lifecycle.starting = true;
            lifecycle.handler.clone()
        };

        info!("Starting DualPathMessenger");
        let opened = self.open(handler.is_some()).await;

        let started = {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.starting = false;
            let inbound = opened?;

            if lifecycle.stopped {
                false
            } else {
                let (shutdown_tx, shutdown_rx) = watch::channel(false);
                let health_loop = HealthCheckLoop::new(self.shared.clone(), shutdown_rx.clone());
                lifecycle.handle = Some(tokio::spawn(health_loop.run()));

                if let (Some(handler), Some(inbound)) = (handler, inbound) {
                    let dispatcher =
                        InboundDispatcher::new(self.shared.clone(), handler, inbound, shutdown_rx);
                    lifecycle.inbound = Some(tokio::spawn(dispatcher.run()));
                }
                lifecycle.shutdown = Some(shutdown_tx);
                true
            }
        };

        if !started {
            warn!("DualPathMessenger stopped while starting");
            self.close_transports().await;
            return Err(Error::Closed);
        }

        info!("DualPathMessenger started");
        Ok(())
    }

    /// Connect both transports, record primary readiness and subscribe for
    /// inbound traffic when asked to
    async fn open(&self, subscribe: bool) -> Result<Option<mpsc::Receiver<Message>>> {
        self.init_metrics();

        self.shared.primary.connect().await?;
        self.shared.fallback.connect().await?;

        let ready = self.wait_for_primary().await;
        if ready {
            info!("Primary transport ready");
        } else {
            error!(
                "Primary transport not ready after {:?}",
                self.shared.config.ready_timeout()
            );
        }
        self.shared.record(CommunicationPath::Primary, ready);

        if !subscribe {
            return Ok(None);
        }

        let (sink, inbound) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        self.shared.primary.subscribe(sink).await?;
        Ok(Some(inbound))
    }

    /// Stop the health loop, wait for it to exit and release transport
    /// connections. In-flight sends are left to finish or time out. A stopped
    /// messenger cannot be restarted.
    pub async fn stop(&self) {
        let (shutdown, handle, inbound) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.stopped {
                return;
            }
            lifecycle.stopped = true;
            (
                lifecycle.shutdown.take(),
                lifecycle.handle.take(),
                lifecycle.inbound.take(),
            )
        };

        info!("Stopping DualPathMessenger");

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Health check loop terminated abnormally: {}", e);
            }
        }
        if let Some(inbound) = inbound {
            if let Err(e) = inbound.await {
                error!("Inbound dispatcher terminated abnormally: {}", e);
            }
        }

        self.close_transports().await;

        info!("DualPathMessenger stopped");
    }

    async fn close_transports(&self) {
        self.shared.primary.close().await;
        self.shared.fallback.close().await;
    }

    /// Whether the health loop is running
    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().handle.is_some()
    }

    /// Send a message over the active path, falling back to the other one.
    ///
    /// `force_path` overrides the active path for this call only; it is a
    /// diagnostic hook. Returns `false` when both paths fail; the message is
    /// then dropped.
    pub async fn send(
        &self,
        type_id: i32,
        payload: impl Into<Payload>,
        destination: Option<&str>,
        force_path: Option<CommunicationPath>,
    ) -> bool {
        let mut message = Message::new(type_id, payload);
        message.destination = destination.map(str::to_string);
        self.send_message(&message, force_path).await
    }

    /// [`send`](Self::send) for a prepared [`Message`]
    pub async fn send_message(
        &self,
        message: &Message,
        force_path: Option<CommunicationPath>,
    ) -> bool {
        let started = Instant::now();

        let (preferred, endpoint) = {
            let state = self.shared.state.lock();
            let preferred = force_path.unwrap_or_else(|| state.failover.active_path());
            let endpoint = message
                .destination
                .as_deref()
                .and_then(|name| state.registry.resolve(name).cloned());
            (preferred, endpoint)
        };
        let alternate = preferred.other();

        if self.attempt(preferred, message, endpoint.as_ref(), started).await {
            return true;
        }

        warn!(
            "Path {} failed for message type {}, trying {}",
            preferred, message.type_id, alternate
        );

        if self.attempt(alternate, message, endpoint.as_ref(), started).await {
            return true;
        }

        error!("Failed to send message type {} via both paths", message.type_id);
        self.shared.metrics.record_dropped(message.type_id);
        false
    }

    /// One transport attempt: deliver, record exactly one sample, evaluate
    async fn attempt(
        &self,
        path: CommunicationPath,
        message: &Message,
        endpoint: Option<&EndpointConfig>,
        started: Instant,
    ) -> bool {
        let result = self.shared.transport(path).deliver(message, endpoint).await;
        let metrics = &self.shared.metrics;

        match &result {
            Ok(()) => {
                metrics.record_sent(path, message.type_id, message.destination_label());
                metrics.record_latency(path, started.elapsed().as_secs_f64());
                debug!("Message type {} delivered via {}", message.type_id, path);
            }
            Err(e) if e.is_config_error() => {
                metrics.record_failed(path, message.type_id);
                error!("Cannot send message type {} via {}: {}", message.type_id, path, e);
            }
            Err(e) => {
                metrics.record_failed(path, message.type_id);
                warn!("Send of message type {} via {} failed: {}", message.type_id, path, e);
            }
        }

        self.shared.record(path, result.is_ok());
        self.shared.evaluate();
        result.is_ok()
    }

    /// Run one health-loop round now
    pub async fn check_health(&self) {
        check_once(&self.shared).await;
    }

    /// Currently active path
    pub fn active_path(&self) -> CommunicationPath {
        self.shared.state.lock().failover.active_path()
    }

    /// Copy of the health metrics for `path`
    pub fn path_metrics(&self, path: CommunicationPath) -> PathHealthMetrics {
        self.shared.state.lock().health.metrics(path).clone()
    }

    /// Consistent snapshot of active path, per-path health and endpoints
    pub fn health_summary(&self) -> HealthSummary {
        let state = self.shared.state.lock();
        HealthSummary {
            active_path: state.failover.active_path(),
            primary: state.health.metrics(CommunicationPath::Primary).into(),
            fallback: state.health.metrics(CommunicationPath::Fallback).into(),
            endpoints: state.registry.names(),
        }
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }

    /// Configuration in use
    pub fn config(&self) -> &MessengerConfig {
        &self.shared.config
    }

    fn init_metrics(&self) {
        let state = self.shared.state.lock();
        let metrics = &self.shared.metrics;
        metrics.set_active_path(state.failover.active_path());
        for path in [CommunicationPath::Primary, CommunicationPath::Fallback] {
            metrics.set_path_status(path, state.health.status(path));
        }
    }

    async fn wait_for_primary(&self) -> bool {
        let deadline = Instant::now() + self.shared.config.ready_timeout();
        loop {
            if self.shared.primary.is_ready() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}
