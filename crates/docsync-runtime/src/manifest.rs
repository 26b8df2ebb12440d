use crate::dependency::Dependency;
use crate::installer::{resolve_path, DependencyInstaller, HttpInstaller, WheelhouseInstaller};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The `[worker]` section of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSection {
    /// Application name, used as the document title.
    pub name: String,
    /// Label of the runtime, shown in the first status message.
    #[serde(default = "default_runtime")]
    pub runtime: String,
}

fn default_runtime() -> String {
    "runtime".to_string()
}

/// The `[requirements]` section of the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequirementsSection {
    /// Dependencies, installed in order.
    #[serde(default)]
    pub packages: Vec<Dependency>,
}

/// Which installer the worker uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallerKind {
    /// Copy archives from a local directory.
    #[default]
    Wheelhouse,
    /// Download archives over HTTP(S).
    Http,
}

/// The `[installer]` section of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Installer implementation.
    #[serde(default)]
    pub kind: InstallerKind,
    /// Local archive directory for the wheelhouse installer.
    #[serde(default = "default_wheelhouse")]
    pub wheelhouse: PathBuf,
    /// Where installed archives are placed.
    #[serde(default = "default_target")]
    pub target: PathBuf,
    /// Simple index for named requirements.
    #[serde(default = "default_index_url")]
    pub index_url: String,
    /// Hosts the HTTP installer may contact.
    #[serde(default)]
    pub allow_hosts: Vec<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_wheelhouse() -> PathBuf {
    PathBuf::from("wheels")
}

fn default_target() -> PathBuf {
    PathBuf::from(".docsync/site")
}

fn default_index_url() -> String {
    "https://pypi.org/simple".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            kind: InstallerKind::default(),
            wheelhouse: default_wheelhouse(),
            target: default_target(),
            index_url: default_index_url(),
            allow_hosts: Vec::new(),
            timeout: default_timeout(),
        }
    }
}

/// The `[host]` section of the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostSection {
    /// Location sent to the runtime after the first render.
    #[serde(default)]
    pub location: Option<Map<String, Value>>,
}

/// Complete `worker.toml` structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerManifest {
    /// Worker section.
    pub worker: WorkerSection,
    /// Requirements section.
    #[serde(default)]
    pub requirements: RequirementsSection,
    /// Installer section.
    #[serde(default)]
    pub installer: InstallerConfig,
    /// Host section.
    #[serde(default)]
    pub host: HostSection,
}

impl WorkerManifest {
    /// Parse a manifest from TOML bytes.
    pub fn from_toml(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::Manifest(format!("Invalid UTF-8: {}", e)))?;
        let manifest: Self = toml::from_str(text).map_err(|e| Error::Manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_toml(&data)
    }

    /// Dependencies in install order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.requirements.packages
    }

    /// Build the configured installer; relative paths resolve against
    /// `base_dir`.
    pub fn build_installer(&self, base_dir: &Path) -> Result<Box<dyn DependencyInstaller>> {
        let config = &self.installer;
        let installer: Box<dyn DependencyInstaller> = match config.kind {
            InstallerKind::Wheelhouse => Box::new(WheelhouseInstaller::new(
                resolve_path(base_dir, &config.wheelhouse),
                resolve_path(base_dir, &config.target),
            )),
            InstallerKind::Http => Box::new(HttpInstaller::new(
                config.index_url.clone(),
                resolve_path(base_dir, &config.target),
                config.allow_hosts.clone(),
                Duration::from_secs(config.timeout),
            )?),
        };
        Ok(installer)
    }

    fn validate(&self) -> Result<()> {
        if self.worker.name.trim().is_empty() {
            return Err(Error::Manifest("worker.name cannot be empty".to_string()));
        }
        if let Some(dep) = self
            .requirements
            .packages
            .iter()
            .find(|d| d.spec().trim().is_empty())
        {
            return Err(Error::Manifest(format!("empty requirement: {:?}", dep.spec())));
        }
        if let Some(location) = &self.host.location {
            if let Some(key) = location.keys().find(|k| !docsync_core::Location::recognizes(k)) {
                log::warn!("host.location.{} is not a location attribute and will be ignored", key);
            }
        }
        Ok(())
    }
}
