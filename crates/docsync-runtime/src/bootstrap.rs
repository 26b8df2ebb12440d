use crate::application::Application;
use crate::dependency::Dependency;
use crate::installer::DependencyInstaller;
use crate::session::Session;
use crate::{Error, Result};
use docsync_core::{Document, OutboundMessage, Outbox};
use log::{error, info, warn};
use std::sync::Arc;

/// Position in the bootstrap pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    /// Nothing has run yet.
    Pending,
    /// The dependency at `index` is installed next.
    Installing {
        /// Index into the dependency list.
        index: usize,
    },
    /// The application definition runs next.
    Executing,
    /// The initial render was sent.
    Ready,
    /// The application definition failed.
    Failed,
}

/// Brings a runtime to the point where it can accept events.
///
/// Each call to [`step`](Bootstrapper::step) runs one stage; a failed install
/// is reported and skipped, a failed application is fatal.
pub struct Bootstrapper<I, A> {
    title: String,
    runtime_label: String,
    dependencies: Vec<Dependency>,
    installer: I,
    application: A,
    outbox: Arc<dyn Outbox<OutboundMessage>>,
    stage: BootStage,
    document: Option<Document>,
    failed: Vec<Dependency>,
}

impl<I: DependencyInstaller, A: Application> Bootstrapper<I, A> {
    /// Create a bootstrapper for the given dependencies and application.
    pub fn new(
        dependencies: Vec<Dependency>,
        installer: I,
        application: A,
        outbox: Arc<dyn Outbox<OutboundMessage>>,
    ) -> Self {
        Self {
            title: String::new(),
            runtime_label: "runtime".to_string(),
            dependencies,
            installer,
            application,
            outbox,
            stage: BootStage::Pending,
            document: None,
            failed: Vec::new(),
        }
    }

    /// Set the document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the runtime label used in the first status message.
    pub fn with_runtime_label(mut self, label: impl Into<String>) -> Self {
        self.runtime_label = label.into();
        self
    }

    /// Current stage.
    pub fn stage(&self) -> BootStage {
        self.stage
    }

    /// Dependencies whose install failed.
    pub fn failed_dependencies(&self) -> &[Dependency] {
        &self.failed
    }

    /// Run the current stage and advance to the next one.
    pub fn step(&mut self) -> Result<BootStage> {
        let next = match self.stage {
            BootStage::Pending => {
                info!("Loading {}", self.runtime_label);
                self.status(format!("Loading {}", self.runtime_label));
                self.install_stage(0)
            }
            BootStage::Installing { index } => {
                self.install(index);
                self.install_stage(index + 1)
            }
            BootStage::Executing => {
                if let Err(err) = self.execute() {
                    self.stage = BootStage::Failed;
                    return Err(err);
                }
                BootStage::Ready
            }
            BootStage::Ready => BootStage::Ready,
            BootStage::Failed => return Err(Error::BootFailed),
        };
        self.stage = next;
        Ok(next)
    }

    /// Run every remaining stage and hand over the ready session.
    pub fn initialize(mut self) -> Result<Session> {
        while self.step()? != BootStage::Ready {}

        let document = self.document.take().ok_or(Error::NotReady)?;
        Ok(Session::new(document, self.outbox))
    }

    fn install_stage(&self, index: usize) -> BootStage {
        if index < self.dependencies.len() {
            BootStage::Installing { index }
        } else {
            BootStage::Executing
        }
    }

    fn install(&mut self, index: usize) {
        let Some(dependency) = self.dependencies.get(index).cloned() else {
            return;
        };
        let name = dependency.display_name().to_string();

        self.status(format!("Installing {}", name));
        if let Err(err) = self.installer.install(&dependency) {
            warn!("failed to install {}: {}", dependency, err);
            self.status(format!("Error while installing {}", name));
            self.failed.push(dependency);
        }
    }

    fn execute(&mut self) -> Result<()> {
        if !self.failed.is_empty() {
            info!(
                "executing with {} dependency install failure(s)",
                self.failed.len()
            );
        }
        self.status("Executing code");

        let mut document = Document::new(self.title.clone());
        if let Err(err) = self.application.build(&mut document) {
            error!("application failed:\n{}", err.description());
            self.status(err.summary());
            return Err(err.into());
        }

        let payload = match document.render_payload() {
            Ok(payload) => payload,
            Err(err) => {
                error!("failed to build render payload: {}", err);
                self.status(err.to_string());
                return Err(err.into());
            }
        };

        info!("rendering {} root(s)", payload.root_ids.len());
        self.outbox.post(OutboundMessage::render(payload));
        self.document = Some(document);
        Ok(())
    }

    fn status(&self, msg: impl Into<String>) {
        self.outbox.post(OutboundMessage::status(msg));
    }
}
