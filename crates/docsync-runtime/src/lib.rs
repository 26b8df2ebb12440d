//! # docsync-runtime
//!
//! Sandboxed side of the docsync worker protocol.
//!
//! This crate provides:
//! - The bootstrap pipeline (dependency installs, application execution,
//!   initial render)
//! - The event dispatcher for `rendered`, `patch` and `location` events
//! - Patch emission with echo prevention
//! - Wheelhouse and HTTP dependency installers
//! - `worker.toml` manifest parsing
//!
//! ## Example
//!
//! ```ignore
//! use docsync_runtime::{run_worker, Bootstrapper, WorkerManifest};
//!
//! let manifest = WorkerManifest::from_path("worker.toml")?;
//! let installer = manifest.build_installer(Path::new("."))?;
//! let bootstrapper = Bootstrapper::new(
//!     manifest.dependencies().to_vec(),
//!     installer,
//!     my_app,
//!     outbox,
//! );
//! run_worker(bootstrapper, inbound_events)?;
//! ```

mod application;
mod bootstrap;
mod dependency;
mod dispatcher;
mod emitter;
pub mod error;
pub mod installer;
mod manifest;
mod session;
mod worker;

pub use application::{last_meaningful_line, Application, ApplicationError};
pub use bootstrap::{BootStage, Bootstrapper};
pub use dependency::{normalize_name, Dependency, ARCHIVE_SUFFIXES};
pub use dispatcher::EventDispatcher;
pub use emitter::PatchEmitter;
pub use error::{Error, Result};
pub use installer::{host_allowed, DependencyInstaller, HttpInstaller, WheelhouseInstaller};
pub use manifest::{
    HostSection, InstallerConfig, InstallerKind, RequirementsSection, WorkerManifest,
    WorkerSection,
};
pub use session::Session;
pub use worker::run_worker;

// Re-export docsync-core types for convenience
pub use docsync_core::{Document, InboundMessage, Model, OutboundMessage, Outbox, Patch, Setter};
