use crate::dependency::{normalize_name, Dependency};
use crate::{Error, Result};
use log::{debug, info, warn};
use reqwest::redirect::Policy;
use reqwest::Url;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Installs one dependency into the runtime environment.
pub trait DependencyInstaller: Send {
    /// Install `dependency`, or fail without side effects on other
    /// dependencies.
    fn install(&mut self, dependency: &Dependency) -> Result<()>;
}

impl<T: DependencyInstaller + ?Sized> DependencyInstaller for Box<T> {
    fn install(&mut self, dependency: &Dependency) -> Result<()> {
        (**self).install(dependency)
    }
}

/// Offline installer that copies archives out of a local directory.
#[derive(Debug)]
pub struct WheelhouseInstaller {
    wheelhouse: PathBuf,
    target: PathBuf,
    installed: HashSet<String>,
}

impl WheelhouseInstaller {
    /// Create an installer reading from `wheelhouse` and writing to `target`.
    pub fn new(wheelhouse: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            wheelhouse: wheelhouse.into(),
            target: target.into(),
            installed: HashSet::new(),
        }
    }

    /// Specs installed so far.
    pub fn installed(&self) -> impl Iterator<Item = &str> {
        self.installed.iter().map(String::as_str)
    }

    fn locate(&self, dependency: &Dependency) -> Result<PathBuf> {
        if dependency.is_archive() {
            let path = self.wheelhouse.join(dependency.file_name());
            return if path.is_file() {
                Ok(path)
            } else {
                Err(Error::install(
                    dependency.spec(),
                    format!("{} not found in wheelhouse", dependency.file_name()),
                ))
            };
        }

        let mut candidates = Vec::new();
        for entry in fs::read_dir(&self.wheelhouse)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if archive_matches(dependency, file_name) {
                candidates.push(path);
            }
        }

        candidates.sort();
        candidates.pop().ok_or_else(|| {
            Error::install(dependency.spec(), "no matching archive in wheelhouse")
        })
    }
}

impl DependencyInstaller for WheelhouseInstaller {
    fn install(&mut self, dependency: &Dependency) -> Result<()> {
        if self.installed.contains(dependency.spec()) {
            debug!("{} already installed", dependency);
            return Ok(());
        }

        let source = self.locate(dependency)?;
        let file_name = source
            .file_name()
            .ok_or_else(|| Error::install(dependency.spec(), "archive path has no file name"))?;

        fs::create_dir_all(&self.target)?;
        fs::copy(&source, self.target.join(file_name))?;
        info!("installed {} from {}", dependency, source.display());

        self.installed.insert(dependency.spec().to_string());
        Ok(())
    }
}

/// Redirect hops a download may follow.
const MAX_REDIRECTS: usize = 5;

/// Installer that downloads archives over HTTP(S).
///
/// Named requirements are resolved through a simple index page; every URL,
/// redirect targets included, must pass the host allowlist before any
/// request is made.
pub struct HttpInstaller {
    client: reqwest::blocking::Client,
    index_url: String,
    cache_dir: PathBuf,
    allowed_hosts: Vec<String>,
    installed: HashSet<String>,
}

impl HttpInstaller {
    /// Create an installer with a request timeout.
    pub fn new(
        index_url: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
        allowed_hosts: Vec<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let redirect_hosts = allowed_hosts.clone();
        let redirect = Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error(format!("more than {} redirects", MAX_REDIRECTS))
            } else if host_allowed(&redirect_hosts, attempt.url().as_str()) {
                attempt.follow()
            } else {
                let target = attempt.url().to_string();
                attempt.error(format!("redirect to disallowed host: {}", target))
            }
        });

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(redirect)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            index_url: index_url.into(),
            cache_dir: cache_dir.into(),
            allowed_hosts,
            installed: HashSet::new(),
        })
    }

    /// Check if a URL's host is allowed.
    pub fn is_host_allowed(&self, url: &str) -> bool {
        host_allowed(&self.allowed_hosts, url)
    }

    fn index_page(&self, dependency: &Dependency) -> String {
        format!(
            "{}/{}/",
            self.index_url.trim_end_matches('/'),
            normalize_name(dependency.requirement_name()).replace('_', "-")
        )
    }

    fn fetch(&self, dependency: &Dependency, url: &str) -> Result<reqwest::blocking::Response> {
        if !self.is_host_allowed(url) {
            warn!("Host not allowed: {}", url);
            return Err(Error::HostNotAllowed(url.to_string()));
        }

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Http(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::install(
                dependency.spec(),
                format!("{} returned {}", url, status),
            ));
        }
        Ok(response)
    }

    /// Pick the newest archive link on the index page matching `dependency`.
    fn resolve(&self, dependency: &Dependency) -> Result<Url> {
        let page_url = self.index_page(dependency);
        let page = self
            .fetch(dependency, &page_url)?
            .text()
            .map_err(|e| Error::Http(e.to_string()))?;
        let base = Url::parse(&page_url)
            .map_err(|e| Error::install(dependency.spec(), format!("{}: {}", page_url, e)))?;

        let mut links: Vec<(String, Url)> = href_values(&page)
            .filter_map(|href| base.join(&href.replace("&amp;", "&")).ok())
            .filter_map(|mut link| {
                link.set_fragment(None);
                let file_name = link.path_segments()?.last()?.to_string();
                archive_matches(dependency, &file_name).then_some((file_name, link))
            })
            .collect();
        links.sort_by(|a, b| a.0.cmp(&b.0));

        links.pop().map(|(_, link)| link).ok_or_else(|| {
            Error::install(
                dependency.spec(),
                format!("no matching archive listed at {}", page_url),
            )
        })
    }
}

impl DependencyInstaller for HttpInstaller {
    fn install(&mut self, dependency: &Dependency) -> Result<()> {
        if self.installed.contains(dependency.spec()) {
            debug!("{} already installed", dependency);
            return Ok(());
        }

        let url = if dependency.is_archive() {
            dependency.spec().to_string()
        } else {
            let link = self.resolve(dependency)?;
            debug!("resolved {} to {}", dependency, link);
            link.to_string()
        };
        let file_name = Dependency::new(url.as_str()).file_name().to_string();

        let body = self
            .fetch(dependency, &url)?
            .bytes()
            .map_err(|e| Error::Http(e.to_string()))?;
        fs::create_dir_all(&self.cache_dir)?;
        fs::write(self.cache_dir.join(&file_name), &body)?;
        info!("downloaded {} as {} ({} bytes)", dependency, file_name, body.len());

        self.installed.insert(dependency.spec().to_string());
        Ok(())
    }
}

/// Whether the host of `url` matches an allowlist entry. Entries are exact
/// hosts or `*.suffix` wildcards; an empty list allows nothing, and so does a
/// URL without a host.
pub fn host_allowed(allowed_hosts: &[String], url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };

    allowed_hosts.iter().any(|allowed| match allowed.strip_prefix("*.") {
        Some(suffix) => host.ends_with(&format!(".{}", suffix)),
        None => allowed == host,
    })
}

/// Whether the archive `file_name` satisfies the named requirement
/// `dependency` (same normalized name, same version when pinned).
fn archive_matches(dependency: &Dependency, file_name: &str) -> bool {
    let candidate = Dependency::new(file_name);
    if !candidate.is_archive() {
        return false;
    }
    if normalize_name(candidate.display_name()) != normalize_name(dependency.requirement_name()) {
        return false;
    }
    dependency.version().is_none() || candidate.version() == dependency.version()
}

/// Quoted `href` attribute values in an HTML page.
fn href_values(page: &str) -> impl Iterator<Item = &str> {
    page.split("href=").skip(1).filter_map(|rest| {
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        rest[1..].split(quote).next()
    })
}

/// Resolve `path` against `base` unless it is already absolute.
pub(crate) fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
