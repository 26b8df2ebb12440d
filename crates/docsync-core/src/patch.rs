use crate::document::Model;
use crate::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Origin attached to a mutation so the side that sent a patch does not
/// receive it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Setter {
    /// The change came from the host controller.
    Host,
    /// The change came from the sandboxed runtime.
    Runtime,
}

/// A single delta within a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PatchEvent {
    /// An attribute of a model took a new JSON value.
    ModelChanged {
        /// Target model id.
        model: String,
        /// Attribute name.
        attr: String,
        /// New value.
        new: Value,
    },
    /// A binary attribute was replaced by one of the patch buffers.
    BinaryChanged {
        /// Target model id.
        model: String,
        /// Attribute name.
        attr: String,
        /// Index into the patch buffers.
        buffer: usize,
    },
    /// A model joined the document.
    ModelAdded {
        /// The complete model.
        model: Model,
        /// Whether the model is rendered as a root.
        #[serde(default)]
        root: bool,
    },
    /// A root model left the document.
    RootRemoved {
        /// Id of the removed model.
        model: String,
    },
}

impl PatchEvent {
    /// The `(model, attr)` pair touched by this event, if any.
    pub fn target(&self) -> Option<(&str, &str)> {
        match self {
            PatchEvent::ModelChanged { model, attr, .. }
            | PatchEvent::BinaryChanged { model, attr, .. } => Some((model, attr)),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PatchWire {
    events: Vec<PatchEvent>,
}

/// A serializable delta describing a mutation of a document.
///
/// Binary attachments travel next to the JSON body; `BinaryChanged` events
/// refer to them by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    /// Ordered events.
    pub events: Vec<PatchEvent>,
    /// Binary attachments.
    pub buffers: Vec<Vec<u8>>,
}

impl Patch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `ModelChanged` event.
    pub fn changed(mut self, model: impl Into<String>, attr: impl Into<String>, new: Value) -> Self {
        self.events.push(PatchEvent::ModelChanged {
            model: model.into(),
            attr: attr.into(),
            new,
        });
        self
    }

    /// Add a `BinaryChanged` event together with its buffer.
    pub fn binary(
        mut self,
        model: impl Into<String>,
        attr: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.buffers.push(data.into());
        self.events.push(PatchEvent::BinaryChanged {
            model: model.into(),
            attr: attr.into(),
            buffer: self.buffers.len() - 1,
        });
        self
    }

    /// Add a `ModelAdded` event.
    pub fn added(mut self, model: Model, root: bool) -> Self {
        self.events.push(PatchEvent::ModelAdded { model, root });
        self
    }

    /// Whether the patch carries no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append another patch, rebasing its buffer indices.
    pub fn extend(&mut self, other: Patch) {
        let offset = self.buffers.len();
        self.buffers.extend(other.buffers);
        self.events
            .extend(other.events.into_iter().map(|event| match event {
                PatchEvent::BinaryChanged {
                    model,
                    attr,
                    buffer,
                } => PatchEvent::BinaryChanged {
                    model,
                    attr,
                    buffer: buffer + offset,
                },
                other => other,
            }));
    }

    /// Serialize the JSON body of the patch.
    pub fn to_json(&self) -> Result<String> {
        let wire = PatchWire {
            events: self.events.clone(),
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parse a patch body, attaching the given buffers.
    pub fn from_json(body: &str, buffers: Vec<Vec<u8>>) -> Result<Self> {
        let wire: PatchWire = serde_json::from_str(body)?;
        Ok(Self {
            events: wire.events,
            buffers,
        })
    }

    /// Buffers encoded for the wire.
    pub fn encoded_buffers(&self) -> Vec<String> {
        self.buffers.iter().map(|b| encode_buffer(b)).collect()
    }
}

/// A completed mutation delivered to document subscribers.
#[derive(Debug, Clone)]
pub struct DocumentChange {
    /// The effective delta.
    pub patch: Patch,
    /// Who caused it; `None` for local changes, including bound callbacks.
    pub setter: Option<Setter>,
}

/// Encode buffer bytes as base64.
pub fn encode_buffer(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

/// Decode a base64 buffer to bytes.
pub fn decode_buffer(value: &str) -> Result<Vec<u8>> {
    Ok(general_purpose::STANDARD.decode(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extend_rebases_buffer_indices() {
        let mut first = Patch::new().binary("img", "data", b"one".to_vec());
        let second = Patch::new()
            .changed("w", "value", json!(1))
            .binary("img", "thumb", b"two".to_vec());

        first.extend(second);

        assert_eq!(first.buffers.len(), 2);
        assert_eq!(
            first.events[2],
            PatchEvent::BinaryChanged {
                model: "img".to_string(),
                attr: "thumb".to_string(),
                buffer: 1,
            }
        );
    }

    #[test]
    fn body_is_tagged_by_kind() {
        let patch = Patch::new().changed("w", "value", json!("Akron"));
        let body: Value = serde_json::from_str(&patch.to_json().unwrap()).unwrap();

        assert_eq!(body["events"][0]["kind"], "ModelChanged");
        assert_eq!(body["events"][0]["new"], "Akron");
    }
}
