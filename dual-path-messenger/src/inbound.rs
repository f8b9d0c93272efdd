//! Dispatch of messages received on the primary bus

use crate::messenger::Shared;
use crate::transport::MessageHandler;
use crate::types::{CommunicationPath, Message};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

/// Task handing inbound messages to the xApp's handler. Each message is one
/// Primary health sample: success when the handler returns `Ok`.
pub(crate) struct InboundDispatcher {
    shared: Arc<Shared>,
    handler: Arc<dyn MessageHandler>,
    inbound: mpsc::Receiver<Message>,
    shutdown: watch::Receiver<bool>,
}

impl InboundDispatcher {
    pub(crate) fn new(
        shared: Arc<Shared>,
        handler: Arc<dyn MessageHandler>,
        inbound: mpsc::Receiver<Message>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            shared,
            handler,
            inbound,
            shutdown,
        }
    }

    /// Run until shutdown or until the bus stops forwarding
    pub(crate) async fn run(mut self) {
        info!("Inbound dispatcher started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let message = tokio::select! {
                message = self.inbound.recv() => message,
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let message = match message {
                Some(message) => message,
                None => break,
            };

            // A handler still running at shutdown is abandoned
            tokio::select! {
                _ = dispatch(&self.shared, self.handler.as_ref(), message) => {}
                _ = self.shutdown.changed() => break,
            }
        }

        info!("Inbound dispatcher stopped");
    }
}

async fn dispatch(shared: &Shared, handler: &dyn MessageHandler, message: Message) {
    let type_id = message.type_id;

    let handled = match handler.handle(message).await {
        Ok(()) => {
            debug!("Handled inbound message type {}", type_id);
            true
        }
        Err(e) => {
            error!("Error in inbound handler for message type {}: {}", type_id, e);
            false
        }
    };

    shared.metrics.record_received(type_id, handled);
    shared.record(CommunicationPath::Primary, handled);
    shared.evaluate();
}
