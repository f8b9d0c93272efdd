//! NATS adapter for the primary bus

use crate::transport::PrimaryBus;
use crate::types::Message;
use crate::{Error, Result};
use async_nats::connection::State;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// NATS bus configuration
#[derive(Debug, Clone)]
pub struct NatsBusConfig {
    /// Server URL
    pub url: String,
    /// Client name announced to the server
    pub client_name: String,
    /// Subject prefix; messages go to `{subject_prefix}.{type_id}` and
    /// inbound traffic is read from `{subject_prefix}.*`
    pub subject_prefix: String,
    /// Bound on a publish + flush
    pub publish_timeout: Duration,
}

impl Default for NatsBusConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            client_name: "dual-path-xapp".to_string(),
            subject_prefix: "ric.msg".to_string(),
            publish_timeout: Duration::from_secs(5),
        }
    }
}

/// Primary bus backed by a NATS client.
///
/// The client is created with retry-on-initial-connect, so `connect` returns
/// at once and the connection (and every later reconnect) happens in the
/// background. Readiness is the client's connection state. The client does
/// not receive its own publishes.
pub struct NatsBus {
    config: NatsBusConfig,
    client: RwLock<Option<async_nats::Client>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl NatsBus {
    /// Create unconnected bus
    pub fn new(config: NatsBusConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
            forwarder: Mutex::new(None),
        }
    }

    /// Subject a message type is published on
    pub fn subject_for(&self, type_id: i32) -> String {
        format!("{}.{}", self.config.subject_prefix, type_id)
    }

    fn client(&self) -> Option<async_nats::Client> {
        self.client.read().clone()
    }
}

/// Message type encoded in the last token of `{prefix}.{type_id}`
fn type_id_from_subject(prefix: &str, subject: &str) -> Option<i32> {
    subject
        .strip_prefix(prefix)?
        .strip_prefix('.')?
        .parse()
        .ok()
}

#[async_trait]
impl PrimaryBus for NatsBus {
    async fn connect(&self) -> Result<()> {
        if self.client.read().is_some() {
            return Ok(());
        }

        info!("Connecting primary bus to {}", self.config.url);

        let client = async_nats::ConnectOptions::new()
            .name(&self.config.client_name)
            .no_echo()
            .retry_on_initial_connect()
            .connect(self.config.url.as_str())
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let mut slot = self.client.write();
        if slot.is_none() {
            *slot = Some(client);
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        match self.client.read().as_ref() {
            Some(client) => client.connection_state() == State::Connected,
            None => false,
        }
    }

    async fn publish(&self, type_id: i32, payload: Bytes) -> Result<()> {
        let client = self.client().ok_or(Error::NotReady)?;
        let subject = self.subject_for(type_id);

        let publish = async {
            client
                .publish(subject.clone(), payload)
                .await
                .map_err(|e| Error::Publish(e.to_string()))?;
            client
                .flush()
                .await
                .map_err(|e| Error::Publish(format!("Flush failed: {}", e)))
        };

        tokio::time::timeout(self.config.publish_timeout, publish)
            .await
            .map_err(|_| Error::Timeout(self.config.publish_timeout.as_millis() as u64))??;

        debug!("Published message type {} on {}", type_id, subject);
        Ok(())
    }

    async fn subscribe(&self, sink: mpsc::Sender<Message>) -> Result<()> {
        let client = self.client().ok_or(Error::NotReady)?;
        let subject = format!("{}.*", self.config.subject_prefix);

        let mut subscriber = client
            .subscribe(subject.clone())
            .await
            .map_err(|e| Error::Subscribe(e.to_string()))?;

        info!("Subscribed to {}", subject);

        let prefix = self.config.subject_prefix.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let type_id = match type_id_from_subject(&prefix, &msg.subject) {
                    Some(type_id) => type_id,
                    None => {
                        warn!("Ignoring inbound message on unexpected subject {}", msg.subject);
                        continue;
                    }
                };

                if sink.send(Message::new(type_id, msg.payload)).await.is_err() {
                    break;
                }
            }
            debug!("Inbound forwarding on {} ended", subject);
        });

        if let Some(previous) = self.forwarder.lock().replace(forwarder) {
            previous.abort();
        }
        Ok(())
    }

    async fn close(&self) {
        if let Some(forwarder) = self.forwarder.lock().take() {
            forwarder.abort();
        }

        let client = self.client.write().take();
        if let Some(client) = client {
            match tokio::time::timeout(self.config.publish_timeout, client.flush()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Primary bus flush on close failed: {}", e),
                Err(_) => warn!("Primary bus flush on close timed out"),
            }
            info!("Primary bus connection released");
        }
    }
}
