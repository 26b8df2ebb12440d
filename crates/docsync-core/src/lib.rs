//! # docsync-core
//!
//! Shared vocabulary of the docsync worker protocol.
//!
//! This crate provides:
//! - The document model with bindings and change subscriptions
//! - Patches and the echo-prevention [`Setter`] marker
//! - Read-only location state with scoped edits
//! - Inbound/outbound wire messages and the [`Outbox`] sender trait
//!
//! ## Example
//!
//! ```ignore
//! use docsync_core::{Document, Model, Patch};
//! use serde_json::json;
//!
//! let mut doc = Document::new("dashboard");
//! doc.add_root(Model::new("filter", "MultiSelect").with("value", json!([])))?;
//! doc.add_root(Model::new("chart", "Bars").with("labels", json!([])))?;
//! doc.bind("filter", &["value"], |doc| {
//!     Patch::new().changed("chart", "labels", doc.attr("filter", "value").cloned().unwrap())
//! });
//! let handle = doc.subscribe(|change| println!("{:?}", change.patch));
//! doc.set("filter", "value", json!(["Akron"]))?;
//! ```

pub mod document;
mod error;
pub mod location;
pub mod message;
mod outbox;
pub mod patch;

pub use document::{Document, Model, RenderPayload, SubscriptionHandle, MAX_CASCADE_ROUNDS};
pub use error::{Error, Result};
pub use location::{Location, ReadonlyGuard, LOCATION_ATTRIBUTES};
pub use message::{InboundMessage, OutboundMessage};
pub use outbox::{Outbox, RecordingOutbox};
pub use patch::{decode_buffer, encode_buffer, DocumentChange, Patch, PatchEvent, Setter};
