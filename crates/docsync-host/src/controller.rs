use crate::{Error, Result};
use chrono::{DateTime, Utc};
use docsync_core::{
    decode_buffer, Document, InboundMessage, OutboundMessage, Outbox, Patch, Setter,
};
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One status report received from the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    /// When the host received it.
    pub at: DateTime<Utc>,
    /// Report text.
    pub msg: String,
}

/// Host side of the protocol: mirrors the runtime document into a view and
/// turns user edits into `patch` events.
pub struct HostController {
    outbox: Arc<dyn Outbox<InboundMessage>>,
    view: Option<Document>,
    statuses: Vec<StatusEntry>,
    pending: Arc<AtomicUsize>,
    location: Option<Map<String, Value>>,
    last_patch_id: Option<String>,
}

impl HostController {
    /// Create a controller sending events to `outbox`.
    pub fn new(outbox: Arc<dyn Outbox<InboundMessage>>) -> Self {
        Self {
            outbox,
            view: None,
            statuses: Vec::new(),
            pending: Arc::new(AtomicUsize::new(0)),
            location: None,
            last_patch_id: None,
        }
    }

    /// Send this location once the view is rendered.
    pub fn with_location(mut self, location: Map<String, Value>) -> Self {
        self.location = Some(location);
        self
    }

    /// The mirrored document, once rendered.
    pub fn view(&self) -> Option<&Document> {
        self.view.as_ref()
    }

    /// Whether the render payload arrived.
    pub fn is_rendered(&self) -> bool {
        self.view.is_some()
    }

    /// Whether forwarded patches still await `idle`.
    pub fn is_busy(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    /// Every status received so far.
    pub fn statuses(&self) -> &[StatusEntry] {
        &self.statuses
    }

    /// Latest status text.
    pub fn last_status(&self) -> Option<&str> {
        self.statuses.last().map(|s| s.msg.as_str())
    }

    /// Id of the last applied runtime patch.
    pub fn last_patch_id(&self) -> Option<&str> {
        self.last_patch_id.as_deref()
    }

    /// Handle a raw JSON message from the runtime.
    pub fn handle_raw(&mut self, raw: &str) -> Result<()> {
        let message: OutboundMessage = serde_json::from_str(raw)?;
        self.handle(message)
    }

    /// Handle one message from the runtime.
    pub fn handle(&mut self, message: OutboundMessage) -> Result<()> {
        match message {
            OutboundMessage::Status { msg } => {
                info!("{}", msg);
                self.statuses.push(StatusEntry { at: Utc::now(), msg });
                Ok(())
            }
            OutboundMessage::Render {
                docs_json,
                render_items,
                root_ids,
            } => self.on_render(&docs_json, &render_items, &root_ids),
            OutboundMessage::Patch {
                patch,
                buffers,
                msg_id,
            } => self.on_patch(&patch, &buffers, msg_id),
            OutboundMessage::Idle => {
                let acknowledged = self
                    .pending
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
                if acknowledged.is_err() {
                    debug!("idle without pending patch");
                } else {
                    debug!("runtime idle");
                }
                Ok(())
            }
        }
    }

    /// Apply a user edit to the view; the change is forwarded to the runtime.
    pub fn edit(&mut self, model: &str, attr: &str, value: Value) -> Result<()> {
        let view = self.view.as_mut().ok_or(Error::NotRendered)?;
        view.set(model, attr, value)?;
        Ok(())
    }

    /// Send navigation state to the runtime.
    pub fn send_location(&self, location: &Map<String, Value>) -> Result<()> {
        let body = serde_json::to_string(location)?;
        self.outbox.post(InboundMessage::Location { location: body });
        Ok(())
    }

    fn on_render(&mut self, docs_json: &str, render_items: &Value, root_ids: &[String]) -> Result<()> {
        let mut view = Document::from_render(docs_json, render_items)?;
        for id in root_ids {
            if view.model(id).is_none() {
                warn!("render lists unknown root {}", id);
            }
        }

        let outbox = Arc::clone(&self.outbox);
        let pending = Arc::clone(&self.pending);
        view.subscribe(move |change| {
            if change.setter == Some(Setter::Runtime) {
                return;
            }
            if !change.patch.buffers.is_empty() {
                warn!(
                    "dropping {} binary attachment(s); host patches carry JSON only",
                    change.patch.buffers.len()
                );
            }
            match change.patch.to_json() {
                Ok(patch) => {
                    pending.fetch_add(1, Ordering::SeqCst);
                    outbox.post(InboundMessage::Patch { patch });
                }
                Err(err) => error!("failed to serialize view patch: {}", err),
            }
        });

        info!("rendered document {} with {} root(s)", view.id(), view.roots().len());
        self.view = Some(view);
        self.outbox.post(InboundMessage::Rendered);
        if let Some(location) = self.location.clone() {
            self.send_location(&location)?;
        }
        Ok(())
    }

    fn on_patch(&mut self, body: &str, buffers: &[String], msg_id: Option<String>) -> Result<()> {
        let view = self.view.as_mut().ok_or(Error::NotRendered)?;
        let buffers = buffers
            .iter()
            .map(|b| decode_buffer(b))
            .collect::<docsync_core::Result<Vec<_>>>()?;
        let patch = Patch::from_json(body, buffers)?;

        view.apply_patch(&patch, Some(Setter::Runtime))?;
        debug!(
            "applied runtime patch {} ({} event(s))",
            msg_id.as_deref().unwrap_or("-"),
            patch.events.len()
        );
        self.last_patch_id = msg_id;
        Ok(())
    }
}
