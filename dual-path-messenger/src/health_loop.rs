//! Background health prober

use crate::messenger::Shared;
use crate::types::CommunicationPath;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Periodic prober feeding the health tracker and the failover controller
pub(crate) struct HealthCheckLoop {
    shared: Arc<Shared>,
    shutdown: watch::Receiver<bool>,
}

impl HealthCheckLoop {
    /// Create loop; it exits once `true` is sent on the shutdown channel
    pub(crate) fn new(shared: Arc<Shared>, shutdown: watch::Receiver<bool>) -> Self {
        Self { shared, shutdown }
    }

    /// Run until shutdown is signalled or the sender is dropped
    pub(crate) async fn run(mut self) {
        let interval = self.shared.config.health_check_interval();
        info!("Health check loop started (every {:?})", interval);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            // Shutdown abandons a round mid-way; samples already taken stay
            tokio::select! {
                _ = check_once(&self.shared) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Health check loop stopped");
    }
}

/// One probe round: primary readiness, every registered endpoint, then a
/// single failover evaluation. Probe errors only become health samples.
pub(crate) async fn check_once(shared: &Shared) {
    let primary = shared.primary.probe(None).await;
    if let Err(e) = &primary {
        debug!("Primary health check failed: {}", e);
    }
    shared.record(CommunicationPath::Primary, primary.is_ok());

    let endpoints = shared.state.lock().registry.endpoints();
    for endpoint in &endpoints {
        let result = shared.fallback.probe(Some(endpoint)).await;
        if let Err(e) = &result {
            debug!("Fallback health check failed for {}: {}", endpoint.service_name, e);
        }
        shared.record(CommunicationPath::Fallback, result.is_ok());
    }

    shared.evaluate();

    let state = shared.state.lock();
    debug!(
        primary = %state.health.status(CommunicationPath::Primary),
        fallback = %state.health.status(CommunicationPath::Fallback),
        active = %state.failover.active_path(),
        "Health status"
    );
}
