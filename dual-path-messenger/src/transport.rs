//! Transport abstraction
//!
//! The messenger drives two [`Transport`]s, one per [`CommunicationPath`].
//! The primary side is built from any [`PrimaryBus`] (a bus client that can
//! report readiness without blocking and publish by message type); the
//! fallback side is [`HttpTransport`](crate::http::HttpTransport).
//! Messages arriving on the primary bus are handed to a [`MessageHandler`].

use crate::types::{CommunicationPath, EndpointConfig, Message};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

/// Handler for messages received on the primary bus
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle incoming message
    async fn handle(&self, message: Message) -> Result<()>;
}

/// One delivery path
#[async_trait]
pub trait Transport: Send + Sync {
    /// Path this transport serves
    fn path(&self) -> CommunicationPath;

    /// Establish connections; called once by `Messenger::start`
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Non-blocking readiness check
    fn is_ready(&self) -> bool {
        true
    }

    /// Deliver one message. `endpoint` is the registry entry for the
    /// message's destination, if any.
    async fn deliver(&self, message: &Message, endpoint: Option<&EndpointConfig>) -> Result<()>;

    /// Health probe. The primary path is probed once with `None`, the
    /// fallback path once per registered endpoint.
    async fn probe(&self, endpoint: Option<&EndpointConfig>) -> Result<()>;

    /// Forward inbound messages into `sink` until closed. Paths without
    /// inbound traffic ignore the call.
    async fn subscribe(&self, _sink: mpsc::Sender<Message>) -> Result<()> {
        Ok(())
    }

    /// Release connections; called once by `Messenger::stop`
    async fn close(&self) {}
}

/// Bus client capability required by the primary path
#[async_trait]
pub trait PrimaryBus: Send + Sync {
    /// Start connecting; must not wait for the connection to come up
    async fn connect(&self) -> Result<()>;

    /// Non-blocking readiness poll
    fn is_ready(&self) -> bool;

    /// Publish; routing by message type is the bus's concern
    async fn publish(&self, type_id: i32, payload: Bytes) -> Result<()>;

    /// Forward messages addressed to this xApp into `sink` until closed
    async fn subscribe(&self, _sink: mpsc::Sender<Message>) -> Result<()> {
        Ok(())
    }

    /// Flush and disconnect
    async fn close(&self);
}

/// Primary path over a [`PrimaryBus`]
pub struct PrimaryTransport<B> {
    bus: B,
}

impl<B: PrimaryBus> PrimaryTransport<B> {
    /// Wrap a bus client
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }
}

#[async_trait]
impl<B: PrimaryBus> Transport for PrimaryTransport<B> {
    fn path(&self) -> CommunicationPath {
        CommunicationPath::Primary
    }

    async fn connect(&self) -> Result<()> {
        self.bus.connect().await
    }

    fn is_ready(&self) -> bool {
        self.bus.is_ready()
    }

    async fn deliver(&self, message: &Message, _endpoint: Option<&EndpointConfig>) -> Result<()> {
        if !self.bus.is_ready() {
            return Err(Error::NotReady);
        }

        let payload = message.payload.to_bytes()?;
        self.bus.publish(message.type_id, payload).await?;

        debug!(
            "Sent message type {} via primary (destination: {})",
            message.type_id,
            message.destination_label()
        );
        Ok(())
    }

    async fn probe(&self, _endpoint: Option<&EndpointConfig>) -> Result<()> {
        if self.bus.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady)
        }
    }

    async fn subscribe(&self, sink: mpsc::Sender<Message>) -> Result<()> {
        self.bus.subscribe(sink).await
    }

    async fn close(&self) {
        self.bus.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingBus {
        ready: AtomicBool,
        published: Mutex<Vec<(i32, Bytes)>>,
        subscribed: Mutex<Option<mpsc::Sender<Message>>>,
    }

    #[async_trait]
    impl PrimaryBus for RecordingBus {
        async fn connect(&self) -> Result<()> {
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn publish(&self, type_id: i32, payload: Bytes) -> Result<()> {
            self.published.lock().push((type_id, payload));
            Ok(())
        }

        async fn subscribe(&self, sink: mpsc::Sender<Message>) -> Result<()> {
            *self.subscribed.lock() = Some(sink);
            Ok(())
        }

        async fn close(&self) {
            self.ready.store(false, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_not_ready_fails_fast() {
        let transport = PrimaryTransport::new(RecordingBus::default());
        let message = Message::new(12050, "payload");

        let result = transport.deliver(&message, None).await;
        assert!(matches!(result, Err(Error::NotReady)));
        assert!(transport.bus().published.lock().is_empty());
        assert!(transport.probe(None).await.is_err());
    }

    #[tokio::test]
    async fn test_publishes_when_ready() {
        let transport = PrimaryTransport::new(RecordingBus::default());
        transport.connect().await.unwrap();
        assert!(transport.is_ready());

        let message = Message::new(12050, "payload").with_destination("kpimon");
        transport.deliver(&message, None).await.unwrap();

        let published = transport.bus().published.lock();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, 12050);
        assert_eq!(&published[0].1[..], b"payload");
    }

    #[tokio::test]
    async fn test_subscribe_reaches_bus() {
        let transport = PrimaryTransport::new(RecordingBus::default());
        let (sink, mut inbound) = mpsc::channel(4);
        transport.subscribe(sink).await.unwrap();

        let bus_sink = transport.bus().subscribed.lock().clone().unwrap();
        bus_sink.send(Message::new(12050, "indication")).await.unwrap();
        assert_eq!(inbound.recv().await.unwrap().type_id, 12050);
    }

    #[tokio::test]
    async fn test_close_makes_not_ready() {
        let transport = PrimaryTransport::new(RecordingBus::default());
        transport.connect().await.unwrap();
        transport.close().await;
        assert!(!transport.is_ready());
        assert_eq!(transport.path(), CommunicationPath::Primary);
    }
}
