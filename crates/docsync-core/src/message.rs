use crate::document::RenderPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message from the host controller to the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// The host finished rendering the initial payload.
    Rendered,
    /// A serialized patch produced by host-side edits.
    Patch {
        /// Patch body.
        patch: String,
    },
    /// Serialized key/value navigation state.
    Location {
        /// JSON object.
        location: String,
    },
    /// Any `type` this protocol does not know.
    #[serde(other)]
    Unknown,
}

/// Message from the runtime to the host controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Progress report for the user.
    Status {
        /// Human-readable text.
        msg: String,
    },
    /// Initial render payload.
    Render {
        /// Serialized documents keyed by id.
        docs_json: String,
        /// Render targets.
        render_items: Value,
        /// Root model ids.
        root_ids: Vec<String>,
    },
    /// A document delta.
    Patch {
        /// Patch body.
        patch: String,
        /// Base64 encoded attachments.
        #[serde(default)]
        buffers: Vec<String>,
        /// Message id.
        #[serde(default)]
        msg_id: Option<String>,
    },
    /// Acknowledges that a host patch was applied.
    Idle,
}

impl OutboundMessage {
    /// Build a status message.
    pub fn status(msg: impl Into<String>) -> Self {
        OutboundMessage::Status { msg: msg.into() }
    }

    /// Build a render message from a payload.
    pub fn render(payload: RenderPayload) -> Self {
        OutboundMessage::Render {
            docs_json: payload.docs_json,
            render_items: payload.render_items,
            root_ids: payload.root_ids,
        }
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Status { .. } => "status",
            OutboundMessage::Render { .. } => "render",
            OutboundMessage::Patch { .. } => "patch",
            OutboundMessage::Idle => "idle",
        }
    }
}
