use docsync_core::Document;
use docsync_host::demo::{SalesFilter, SORT_SALES};
use docsync_host::{HostController, JsonChannel};
use docsync_runtime::{
    run_worker, ApplicationError, Bootstrapper, Dependency, DependencyInstaller, WheelhouseInstaller,
};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

struct NoopInstaller;

impl DependencyInstaller for NoopInstaller {
    fn install(&mut self, _dependency: &Dependency) -> docsync_runtime::Result<()> {
        Ok(())
    }
}

fn labels(host: &HostController) -> Vec<String> {
    host.view()
        .and_then(|view| view.attr("chart", "labels"))
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn host_edits_round_trip_through_the_worker() {
    let (to_host, mut host_inbox) = JsonChannel::pair();
    let (to_worker, mut worker_inbox) = JsonChannel::pair();

    let worker = thread::spawn(move || {
        let bootstrapper =
            Bootstrapper::new(Vec::new(), NoopInstaller, SalesFilter::new(), Arc::new(to_host))
                .with_title("Sales")
                .with_runtime_label("test runtime");
        run_worker(bootstrapper, std::iter::from_fn(move || worker_inbox.blocking_recv()))
    });

    let mut host = HostController::new(Arc::new(to_worker));
    let mut edits = vec![
        ("sort_by", json!(SORT_SALES)),
        ("cities", json!(["Dayton"])),
    ];
    while let Some(raw) = host_inbox.blocking_recv() {
        host.handle_raw(&raw).unwrap();
        if !host.is_rendered() || host.is_busy() {
            continue;
        }
        match edits.pop() {
            Some((model, value)) => host.edit(model, "value", value).unwrap(),
            None => break,
        }
    }

    assert_eq!(host.statuses()[0].msg, "Loading test runtime");
    assert_eq!(host.last_status(), Some("Executing code"));
    assert_eq!(host.view().unwrap().title(), "Sales");

    let labels = labels(&host);
    assert_eq!(labels.len(), 6);
    assert_eq!(labels[0], "Toledo");
    assert_eq!(labels[1], "Dayton");
    assert_eq!(host.last_patch_id(), Some("patch-2"));

    drop(host);
    worker.join().unwrap().unwrap();
}

#[test]
fn failed_application_reports_last_line_and_closes() {
    let (to_host, mut host_inbox) = JsonChannel::pair();
    let (to_worker, mut worker_inbox) = JsonChannel::pair();

    let temp_dir = TempDir::new().unwrap();
    let wheels = temp_dir.path().join("wheels");
    fs::create_dir_all(&wheels).unwrap();
    fs::write(wheels.join("panel-0.14.4-py3-none-any.whl"), b"wheel").unwrap();
    let installer = WheelhouseInstaller::new(&wheels, temp_dir.path().join("site"));

    let worker = thread::spawn(move || {
        let app = |_doc: &mut Document| -> Result<(), ApplicationError> {
            Err(ApplicationError::new(
                "Traceback (most recent call last):\n  File \"app\", line 1\nNameError: name 'pn' is not defined\n",
            ))
        };
        let bootstrapper = Bootstrapper::new(
            vec![
                Dependency::new("https://cdn.example.org/wheels/panel-0.14.4-py3-none-any.whl"),
                Dependency::new("missing-package"),
            ],
            installer,
            app,
            Arc::new(to_host),
        );
        run_worker(bootstrapper, std::iter::from_fn(move || worker_inbox.blocking_recv()))
    });

    let mut host = HostController::new(Arc::new(to_worker));
    while let Some(raw) = host_inbox.blocking_recv() {
        host.handle_raw(&raw).unwrap();
    }

    let texts: Vec<&str> = host.statuses().iter().map(|s| s.msg.as_str()).collect();
    assert_eq!(
        texts,
        [
            "Loading runtime",
            "Installing panel",
            "Installing missing-package",
            "Error while installing missing-package",
            "Executing code",
            "NameError: name 'pn' is not defined",
        ]
    );
    assert!(!host.is_rendered());
    assert!(worker.join().unwrap().is_err());
}
