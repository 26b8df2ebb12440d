use serde::{Deserialize, Serialize};
use std::fmt;

/// File suffixes that mark a dependency as a direct archive reference.
pub const ARCHIVE_SUFFIXES: &[&str] = &[".whl", ".tar.gz", ".zip"];

/// A dependency as written in the worker manifest: a requirement such as
/// `pandas` or `pyodide-http==0.1.0`, or a URL/path to an archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dependency {
    spec: String,
}

impl Dependency {
    /// Wrap a dependency spec.
    pub fn new(spec: impl Into<String>) -> Self {
        Self { spec: spec.into() }
    }

    /// The spec exactly as written.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Whether the spec points directly at an archive.
    pub fn is_archive(&self) -> bool {
        ARCHIVE_SUFFIXES.iter().any(|s| self.spec.ends_with(s))
    }

    /// Last path segment of the spec.
    pub fn file_name(&self) -> &str {
        self.spec.rsplit('/').next().unwrap_or(&self.spec)
    }

    /// Name shown in status messages.
    ///
    /// Archives are reduced to their distribution name
    /// (`.../panel-0.14.4-py3-none-any.whl` becomes `panel`); requirements are
    /// shown unchanged.
    pub fn display_name(&self) -> &str {
        if self.is_archive() {
            self.file_name().split('-').next().unwrap_or_default()
        } else {
            &self.spec
        }
    }

    /// Distribution name without version constraints.
    pub fn requirement_name(&self) -> &str {
        if self.is_archive() {
            return self.display_name();
        }
        let end = self
            .spec
            .find(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~' | '[' | ';' | ' '))
            .unwrap_or(self.spec.len());
        &self.spec[..end]
    }

    /// Version pinned with `==`, or the version segment of an archive name.
    pub fn version(&self) -> Option<&str> {
        if self.is_archive() {
            let version = self.file_name().split('-').nth(1)?;
            return Some(
                ARCHIVE_SUFFIXES
                    .iter()
                    .find_map(|s| version.strip_suffix(s))
                    .unwrap_or(version),
            );
        }
        self.spec
            .split_once("==")
            .map(|(_, version)| version.trim())
            .filter(|v| !v.is_empty())
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

impl From<&str> for Dependency {
    fn from(spec: &str) -> Self {
        Self::new(spec)
    }
}

/// Normalize a distribution name for comparisons (`Pyodide-HTTP` and
/// `pyodide_http` are the same distribution).
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '-' | '.' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}
