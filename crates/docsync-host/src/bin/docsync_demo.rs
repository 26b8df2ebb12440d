//! docsync-demo: run the demo dashboard in a worker thread and drive it from
//! a host controller.
//!
//! # Usage
//!
//! ```bash
//! # Bootstrap, render and exit
//! docsync-demo --manifest worker.toml
//!
//! # Apply scripted edits after the first render
//! docsync-demo --set cities.value='["Dayton","Kent"]' --set sort_by.value=Sales
//! ```

use anyhow::{anyhow, Context};
use clap::Parser;
use docsync_host::demo::SalesFilter;
use docsync_host::{HostController, JsonChannel};
use docsync_runtime::{run_worker, Bootstrapper, WorkerManifest};
use env_logger::Env;
use log::{error, info};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

/// Run the docsync demo dashboard.
///
/// The runtime bootstraps on a worker thread; the host mirrors its document,
/// applies the scripted edits and prints the resulting view.
#[derive(Parser, Debug)]
#[command(name = "docsync-demo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the worker manifest
    #[arg(short, long, default_value = "worker.toml")]
    manifest: PathBuf,

    /// Edit to apply after render, as MODEL.ATTR=VALUE (VALUE is JSON or a bare string)
    #[arg(long = "set", value_name = "MODEL.ATTR=VALUE")]
    edits: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// A scripted view edit.
#[derive(Debug)]
struct Edit {
    model: String,
    attr: String,
    value: Value,
}

fn parse_edit(raw: &str) -> anyhow::Result<Edit> {
    let (target, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("edit {:?} is missing '='", raw))?;
    let (model, attr) = target
        .split_once('.')
        .ok_or_else(|| anyhow!("edit target {:?} must be MODEL.ATTR", target))?;
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    Ok(Edit {
        model: model.to_string(),
        attr: attr.to_string(),
        value,
    })
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    if let Err(err) = run(args).await {
        error!("{:#}", err);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    if !args.manifest.is_file() {
        return Err(anyhow!("manifest not found: {}", args.manifest.display()));
    }

    info!("Reading manifest: {}", args.manifest.display());
    let manifest = WorkerManifest::from_path(&args.manifest)
        .with_context(|| format!("failed to load {}", args.manifest.display()))?;
    let base_dir = args
        .manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let edits = args
        .edits
        .iter()
        .map(|raw| parse_edit(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let (to_host, mut host_inbox) = JsonChannel::pair();
    let (to_worker, mut worker_inbox) = JsonChannel::pair();

    let worker_manifest = manifest.clone();
    let worker = tokio::task::spawn_blocking(move || -> docsync_runtime::Result<()> {
        let installer = worker_manifest.build_installer(&base_dir)?;
        let bootstrapper = Bootstrapper::new(
            worker_manifest.dependencies().to_vec(),
            installer,
            SalesFilter::new(),
            Arc::new(to_host),
        )
        .with_title(worker_manifest.worker.name.clone())
        .with_runtime_label(worker_manifest.worker.runtime.clone());

        run_worker(bootstrapper, std::iter::from_fn(move || worker_inbox.blocking_recv()))
    });

    let mut host = HostController::new(Arc::new(to_worker));
    if let Some(location) = manifest.host.location.clone() {
        host = host.with_location(location);
    }

    let mut pending_edits = Some(edits);
    while let Some(raw) = host_inbox.recv().await {
        host.handle_raw(&raw)?;

        if !host.is_rendered() {
            continue;
        }
        if let Some(edits) = pending_edits.take() {
            for edit in edits {
                info!("Setting {}.{} = {}", edit.model, edit.attr, edit.value);
                host.edit(&edit.model, &edit.attr, edit.value)?;
            }
        }
        if !host.is_busy() {
            break;
        }
    }

    let view = host.view().map(|doc| {
        doc.roots()
            .iter()
            .filter_map(|id| doc.model(id))
            .map(|model| format!("{} ({}): {}", model.id, model.kind, Value::Object(model.attributes.clone())))
            .collect::<Vec<_>>()
    });

    // Closing the host side ends the worker's event stream.
    drop(host);
    worker.await.context("worker thread panicked")??;

    for line in view.unwrap_or_default() {
        println!("{}", line);
    }
    Ok(())
}
