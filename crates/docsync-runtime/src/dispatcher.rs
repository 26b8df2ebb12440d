use crate::session::Session;
use crate::{Error, Result};
use docsync_core::{InboundMessage, OutboundMessage, Patch, Setter};
use log::{debug, warn};
use serde_json::{Map, Value};

/// Handles inbound host events, one at a time, in arrival order.
#[derive(Debug)]
pub struct EventDispatcher {
    session: Session,
}

impl EventDispatcher {
    /// Create a dispatcher owning a ready session.
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// The session events are applied to.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access to the session.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Give the session back.
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Handle a raw JSON envelope. Envelopes that do not parse are ignored.
    pub fn dispatch_raw(&mut self, raw: &str) -> Result<()> {
        match serde_json::from_str::<InboundMessage>(raw) {
            Ok(event) => self.dispatch(event),
            Err(err) => {
                warn!("ignoring malformed event: {}", err);
                Ok(())
            }
        }
    }

    /// Handle one event.
    pub fn dispatch(&mut self, event: InboundMessage) -> Result<()> {
        match event {
            InboundMessage::Rendered => self.on_rendered(),
            InboundMessage::Patch { patch } => self.on_patch(&patch),
            InboundMessage::Location { location } => self.on_location(&location),
            InboundMessage::Unknown => {
                debug!("ignoring event of unknown type");
                Ok(())
            }
        }
    }

    /// Report a dispatch failure to the host.
    pub fn report(&self, err: &Error) {
        self.session.post(OutboundMessage::status(err.to_string()));
    }

    fn on_rendered(&mut self) -> Result<()> {
        if !self.session.link() {
            debug!("document already linked");
        }
        Ok(())
    }

    fn on_patch(&mut self, body: &str) -> Result<()> {
        let session = &mut self.session;
        let result = Patch::from_json(body, Vec::new()).and_then(|patch| {
            debug!("applying {} host event(s)", patch.events.len());
            session
                .document_mut()
                .apply_patch(&patch, Some(Setter::Host))
        });

        // The host waits for this even when the patch was rejected.
        self.session.post(OutboundMessage::Idle);
        result.map_err(Error::from)
    }

    fn on_location(&mut self, body: &str) -> Result<()> {
        let data: Map<String, Value> = serde_json::from_str(body)?;
        let Some(location) = self.session.document_mut().location_mut() else {
            debug!("document has no location; ignoring update");
            return Ok(());
        };

        let applied = location.edit_readonly().update(&data)?;
        debug!("location updated: {:?}", applied);
        Ok(())
    }
}
