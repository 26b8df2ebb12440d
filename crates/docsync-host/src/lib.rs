//! # docsync-host
//!
//! Host side of the docsync worker protocol.
//!
//! This crate provides:
//! - [`HostController`]: mirrors the runtime document, forwards user edits
//!   and tracks status reports
//! - [`JsonChannel`]: JSON-over-channel transport for either direction
//! - [`demo::SalesFilter`]: a small filter dashboard for the demo binary
//!
//! ## Example
//!
//! ```ignore
//! use docsync_host::{HostController, JsonChannel};
//! use std::sync::Arc;
//!
//! let (to_worker, worker_inbox) = JsonChannel::pair();
//! let mut host = HostController::new(Arc::new(to_worker));
//! while let Some(raw) = from_worker.recv().await {
//!     host.handle_raw(&raw)?;
//! }
//! ```
//!
//! ## Demo binary
//!
//! Build with the `cli` feature and run against a `worker.toml`:
//!
//! ```bash
//! docsync-demo --manifest worker.toml --set cities.value='["Dayton"]'
//! ```

mod controller;
pub mod demo;
mod error;
pub mod transport;

pub use controller::{HostController, StatusEntry};
pub use error::{Error, Result};
pub use transport::JsonChannel;
