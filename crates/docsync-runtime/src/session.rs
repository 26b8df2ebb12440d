use crate::emitter::PatchEmitter;
use docsync_core::{Document, OutboundMessage, Outbox, Setter, SubscriptionHandle};
use log::info;
use std::fmt;
use std::sync::Arc;

/// The single live application instance of a runtime.
///
/// A session only exists once the bootstrap has completed, so holding one
/// means the document is ready for events.
pub struct Session {
    document: Document,
    outbox: Arc<dyn Outbox<OutboundMessage>>,
    forwarding: Option<SubscriptionHandle>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("document", &self.document)
            .field("linked", &self.is_linked())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(document: Document, outbox: Arc<dyn Outbox<OutboundMessage>>) -> Self {
        Self {
            document,
            outbox,
            forwarding: None,
        }
    }

    /// The application document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access for application-side triggers.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Whether document changes are forwarded to the host.
    pub fn is_linked(&self) -> bool {
        self.forwarding.is_some()
    }

    /// Start forwarding document changes as `patch` messages, skipping
    /// changes applied on behalf of the host.
    ///
    /// Returns `false` when forwarding was already installed.
    pub fn link(&mut self) -> bool {
        if self.forwarding.is_some() {
            return false;
        }
        let emitter = PatchEmitter::new(Arc::clone(&self.outbox));
        let handle = self.document.subscribe(emitter.forwarder(Setter::Host));
        self.forwarding = Some(handle);
        info!("linked document {} to host", self.document.id());
        true
    }

    /// Stop forwarding document changes.
    pub fn unlink(&mut self) -> bool {
        match self.forwarding.take() {
            Some(handle) => self.document.unsubscribe(handle),
            None => false,
        }
    }

    /// Post a message to the host.
    pub fn post(&self, message: OutboundMessage) {
        self.outbox.post(message);
    }
}
