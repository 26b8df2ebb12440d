use crate::Result;
use docsync_core::{DocumentChange, OutboundMessage, Outbox, Patch, Setter};
use log::{debug, error};
use std::sync::Arc;

/// Serializes document deltas into outbound `patch` messages.
pub struct PatchEmitter {
    outbox: Arc<dyn Outbox<OutboundMessage>>,
    sequence: u64,
}

impl PatchEmitter {
    /// Create an emitter posting to `outbox`.
    pub fn new(outbox: Arc<dyn Outbox<OutboundMessage>>) -> Self {
        Self {
            outbox,
            sequence: 0,
        }
    }

    /// Post one patch message.
    pub fn emit(&mut self, patch: &Patch) -> Result<()> {
        let body = patch.to_json()?;
        self.sequence += 1;
        self.outbox.post(OutboundMessage::Patch {
            patch: body,
            buffers: patch.encoded_buffers(),
            msg_id: Some(format!("patch-{}", self.sequence)),
        });
        Ok(())
    }

    /// Turn the emitter into a document subscriber that skips changes made by
    /// `suppress`.
    pub fn forwarder(mut self, suppress: Setter) -> impl FnMut(&DocumentChange) + Send + 'static {
        move |change: &DocumentChange| {
            if change.setter == Some(suppress) {
                debug!(
                    "not echoing {} event(s) set by {:?}",
                    change.patch.events.len(),
                    suppress
                );
                return;
            }
            if let Err(err) = self.emit(&change.patch) {
                error!("failed to emit patch: {}", err);
            }
        }
    }
}
