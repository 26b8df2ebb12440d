//! JSON-over-channel transport between the host and the worker thread.

use docsync_core::Outbox;
use log::{error, warn};
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Outbox that serializes messages to JSON and pushes them into an unbounded
/// channel, the way a worker `postMessage` would.
#[derive(Debug, Clone)]
pub struct JsonChannel {
    sender: UnboundedSender<String>,
}

impl JsonChannel {
    /// Wrap an existing sender.
    pub fn new(sender: UnboundedSender<String>) -> Self {
        Self { sender }
    }

    /// Create a channel and return its sending outbox and raw receiver.
    pub fn pair() -> (Self, UnboundedReceiver<String>) {
        let (sender, receiver) = unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl<M: Serialize> Outbox<M> for JsonChannel {
    fn post(&self, message: M) {
        let raw = match serde_json::to_string(&message) {
            Ok(raw) => raw,
            Err(err) => {
                error!("failed to serialize message: {}", err);
                return;
            }
        };
        if self.sender.send(raw).is_err() {
            warn!("receiver closed; message dropped");
        }
    }
}
