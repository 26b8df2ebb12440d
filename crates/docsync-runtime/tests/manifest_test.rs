use docsync_runtime::{
    Dependency, DependencyInstaller, Error, HttpInstaller, InstallerKind, WheelhouseInstaller,
    WorkerManifest,
};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const MANIFEST: &str = r#"
[worker]
name = "sales-dashboard"
runtime = "pyodide"

[requirements]
packages = [
    "https://cdn.holoviz.org/panel/0.14.4/dist/wheels/panel-0.14.4-py3-none-any.whl",
    "pyodide-http==0.1.0",
    "pandas",
]

[installer]
kind = "wheelhouse"
wheelhouse = "wheels"

[host]
location = { pathname = "/dashboard", search = "?city=Akron" }
"#;

fn write_wheelhouse(root: &Path) {
    let wheels = root.join("wheels");
    fs::create_dir_all(&wheels).unwrap();
    for name in [
        "panel-0.14.4-py3-none-any.whl",
        "pyodide_http-0.1.0-py3-none-any.whl",
        "pyodide_http-0.2.1-py3-none-any.whl",
        "README.txt",
    ] {
        fs::write(wheels.join(name), name.as_bytes()).unwrap();
    }
}

#[test]
fn manifest_parses_with_defaults() {
    let manifest = WorkerManifest::from_toml(MANIFEST.as_bytes()).unwrap();

    assert_eq!(manifest.worker.name, "sales-dashboard");
    assert_eq!(manifest.worker.runtime, "pyodide");
    assert_eq!(manifest.dependencies().len(), 3);
    assert_eq!(manifest.dependencies()[0].display_name(), "panel");
    assert_eq!(manifest.installer.kind, InstallerKind::Wheelhouse);
    assert_eq!(manifest.installer.timeout, 30);
    let location = manifest.host.location.unwrap();
    assert_eq!(location["pathname"], "/dashboard");
}

#[test]
fn manifest_rejects_empty_name() {
    let err = WorkerManifest::from_toml(b"[worker]\nname = \" \"\n").unwrap_err();
    assert!(matches!(err, Error::Manifest(_)));
}

#[test]
fn manifest_reads_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("worker.toml");
    fs::write(&path, MANIFEST).unwrap();

    let manifest = WorkerManifest::from_path(&path).unwrap();
    assert!(manifest.installer.allow_hosts.is_empty());
}

#[test]
fn wheelhouse_installs_archives_and_pinned_requirements() {
    let temp_dir = TempDir::new().unwrap();
    write_wheelhouse(temp_dir.path());
    let target = temp_dir.path().join("site");
    let mut installer = WheelhouseInstaller::new(temp_dir.path().join("wheels"), &target);

    installer
        .install(&Dependency::new(
            "https://cdn.holoviz.org/panel/0.14.4/dist/wheels/panel-0.14.4-py3-none-any.whl",
        ))
        .unwrap();
    installer
        .install(&Dependency::new("pyodide-http==0.1.0"))
        .unwrap();

    assert!(target.join("panel-0.14.4-py3-none-any.whl").is_file());
    assert!(target.join("pyodide_http-0.1.0-py3-none-any.whl").is_file());
    assert!(!target.join("pyodide_http-0.2.1-py3-none-any.whl").exists());
}

#[test]
fn wheelhouse_picks_latest_for_unpinned_requirement() {
    let temp_dir = TempDir::new().unwrap();
    write_wheelhouse(temp_dir.path());
    let target = temp_dir.path().join("site");
    let mut installer = WheelhouseInstaller::new(temp_dir.path().join("wheels"), &target);

    installer.install(&Dependency::new("Pyodide-HTTP")).unwrap();
    installer.install(&Dependency::new("Pyodide-HTTP")).unwrap();

    assert!(target.join("pyodide_http-0.2.1-py3-none-any.whl").is_file());
    assert_eq!(installer.installed().count(), 1);
}

#[test]
fn wheelhouse_missing_requirement_fails() {
    let temp_dir = TempDir::new().unwrap();
    write_wheelhouse(temp_dir.path());
    let mut installer =
        WheelhouseInstaller::new(temp_dir.path().join("wheels"), temp_dir.path().join("site"));

    let err = installer.install(&Dependency::new("pandas")).unwrap_err();
    assert!(matches!(err, Error::Install { dependency, .. } if dependency == "pandas"));
}

#[test]
fn manifest_builds_wheelhouse_installer_relative_to_base() {
    let temp_dir = TempDir::new().unwrap();
    write_wheelhouse(temp_dir.path());
    let manifest = WorkerManifest::from_toml(MANIFEST.as_bytes()).unwrap();

    let mut installer = manifest.build_installer(temp_dir.path()).unwrap();
    installer.install(&manifest.dependencies()[0]).unwrap();

    assert!(temp_dir
        .path()
        .join(".docsync/site/panel-0.14.4-py3-none-any.whl")
        .is_file());
}

const PANEL_WHEEL: &str = "panel-0.14.4-py3-none-any.whl";

fn response(status: &str, headers: &str, body: &[u8]) -> Vec<u8> {
    let mut raw = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
        status,
        body.len(),
        headers
    )
    .into_bytes();
    raw.extend_from_slice(body);
    raw
}

/// Loopback HTTP server answering canned responses by request path.
struct TestServer {
    base: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    fn start(routes: impl FnOnce(&str) -> HashMap<String, Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes = routes(&base);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let Ok(reader) = stream.try_clone() else { continue };
                let mut reader = BufReader::new(reader);

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                loop {
                    let mut header = String::new();
                    match reader.read_line(&mut header) {
                        Ok(n) if n > 2 => continue,
                        _ => break,
                    }
                }

                counter.fetch_add(1, Ordering::SeqCst);
                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let reply = routes
                    .get(path)
                    .cloned()
                    .unwrap_or_else(|| response("404 Not Found", "", b"missing"));
                let _ = stream.write_all(&reply);
            }
        });

        Self { base, hits }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn loopback_installer(server: &TestServer, cache: &Path) -> HttpInstaller {
    HttpInstaller::new(
        server.url("/simple"),
        cache,
        vec!["127.0.0.1".to_string()],
        Duration::from_secs(5),
    )
    .unwrap()
}

fn wheel_route(_base: &str) -> HashMap<String, Vec<u8>> {
    HashMap::from([(
        format!("/files/{}", PANEL_WHEEL),
        response("200 OK", "", b"panel wheel"),
    )])
}

#[test]
fn http_archive_download_lands_in_cache() {
    let server = TestServer::start(wheel_route);
    let temp_dir = TempDir::new().unwrap();
    let cache = temp_dir.path().join("cache");
    let mut installer = loopback_installer(&server, &cache);

    let dependency = Dependency::new(server.url(&format!("/files/{}", PANEL_WHEEL)));
    installer.install(&dependency).unwrap();

    assert_eq!(fs::read(cache.join(PANEL_WHEEL)).unwrap(), b"panel wheel");
}

#[test]
fn http_repeat_install_does_not_download_again() {
    let server = TestServer::start(wheel_route);
    let temp_dir = TempDir::new().unwrap();
    let mut installer = loopback_installer(&server, temp_dir.path());

    let dependency = Dependency::new(server.url(&format!("/files/{}", PANEL_WHEEL)));
    installer.install(&dependency).unwrap();
    installer.install(&dependency).unwrap();

    assert_eq!(server.hits(), 1);
}

#[test]
fn http_error_status_is_an_install_error() {
    let server = TestServer::start(wheel_route);
    let temp_dir = TempDir::new().unwrap();
    let mut installer = loopback_installer(&server, temp_dir.path());

    let dependency = Dependency::new(server.url("/files/bokeh-3.1.0-py3-none-any.whl"));
    let err = installer.install(&dependency).unwrap_err();

    assert!(matches!(err, Error::Install { reason, .. } if reason.contains("404")));
    assert!(!temp_dir.path().join("bokeh-3.1.0-py3-none-any.whl").exists());
}

#[test]
fn http_named_requirement_downloads_listed_archive() {
    let server = TestServer::start(|_| {
        let page = br#"<html><body>
<a href="/files/pyodide_http-0.1.0-py3-none-any.whl#sha256=00ff">pyodide_http-0.1.0</a>
<a href="../../files/pyodide_http-0.2.1-py3-none-any.whl">pyodide_http-0.2.1</a>
<a href="/files/pyodide_httpx-9.0.0-py3-none-any.whl">pyodide_httpx-9.0.0</a>
</body></html>"#;
        HashMap::from([
            ("/simple/pyodide-http/".to_string(), response("200 OK", "", page)),
            (
                "/files/pyodide_http-0.1.0-py3-none-any.whl".to_string(),
                response("200 OK", "", b"old"),
            ),
            (
                "/files/pyodide_http-0.2.1-py3-none-any.whl".to_string(),
                response("200 OK", "", b"new"),
            ),
        ])
    });
    let temp_dir = TempDir::new().unwrap();
    let mut installer = loopback_installer(&server, temp_dir.path());

    installer
        .install(&Dependency::new("pyodide-http==0.1.0"))
        .unwrap();
    installer.install(&Dependency::new("Pyodide_HTTP")).unwrap();

    let cached = |name: &str| fs::read(temp_dir.path().join(name)).unwrap();
    assert_eq!(cached("pyodide_http-0.1.0-py3-none-any.whl"), b"old");
    assert_eq!(cached("pyodide_http-0.2.1-py3-none-any.whl"), b"new");
}

#[test]
fn http_named_requirement_without_listed_archive_fails() {
    let server = TestServer::start(|_| {
        HashMap::from([(
            "/simple/pandas/".to_string(),
            response("200 OK", "", b"<html>no links</html>"),
        )])
    });
    let temp_dir = TempDir::new().unwrap();
    let mut installer = loopback_installer(&server, temp_dir.path());

    let err = installer.install(&Dependency::new("pandas")).unwrap_err();

    assert!(matches!(err, Error::Install { dependency, .. } if dependency == "pandas"));
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[test]
fn http_redirects_stay_on_the_allowlist() {
    let server = TestServer::start(|base| {
        let port = base.rsplit(':').next().unwrap_or_default().to_string();
        HashMap::from([
            (
                "/moved.whl".to_string(),
                response(
                    "302 Found",
                    &format!("Location: /files/{}\r\n", PANEL_WHEEL),
                    b"",
                ),
            ),
            (
                "/escape.whl".to_string(),
                response(
                    "302 Found",
                    &format!("Location: http://localhost:{}/files/{}\r\n", port, PANEL_WHEEL),
                    b"",
                ),
            ),
            (
                format!("/files/{}", PANEL_WHEEL),
                response("200 OK", "", b"panel wheel"),
            ),
        ])
    });
    let temp_dir = TempDir::new().unwrap();
    let mut installer = loopback_installer(&server, temp_dir.path());

    installer
        .install(&Dependency::new(server.url("/moved.whl")))
        .unwrap();
    assert_eq!(fs::read(temp_dir.path().join("moved.whl")).unwrap(), b"panel wheel");

    let err = installer
        .install(&Dependency::new(server.url("/escape.whl")))
        .unwrap_err();
    assert!(matches!(err, Error::Http(_)));
    assert!(!temp_dir.path().join("escape.whl").exists());
}
