//! Watch daemon: polls a source tree and feeds changes into the sync engine.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use manager::{
    ChangeSource, PollingChangeSource, Priority, SyncConfig, SyncManager, TracingSink,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Durable one-way file mirroring daemon.
#[derive(Debug, Parser)]
#[command(name = "fsmirrord", version, about)]
struct Args {
    /// Authoritative directory to mirror from.
    #[arg(long)]
    source: PathBuf,

    /// Mirror directory to replicate into.
    #[arg(long)]
    dest: PathBuf,

    /// Directory for the transaction journal.
    #[arg(long, default_value = "/var/log/file_sync")]
    log_dir: PathBuf,

    /// Worker-pool size; defaults to the host CPU count.
    #[arg(long)]
    threads: Option<usize>,

    /// Poll interval for change detection, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Full-tree reconciliation interval, in seconds.
    #[arg(long, default_value_t = 6 * 60 * 60)]
    reconcile_interval_secs: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("fsmirrord: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = SyncConfig::builder(&args.source, &args.dest)
        .log_dir(&args.log_dir)
        .reconcile_interval(Duration::from_secs(args.reconcile_interval_secs));
    if let Some(threads) = args.threads {
        builder = builder.num_threads(threads);
    }
    let config = builder.build()?;

    let manager = SyncManager::with_parts(
        config,
        Box::new(manager::RootPathMapper::new(&args.source, &args.dest)),
        Box::new(TracingSink),
    )?;
    manager.start()?;
    info!(
        source = %args.source.display(),
        dest = %args.dest.display(),
        "mirroring started"
    );

    // Signal handling stays out here; the engine only knows stop().
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))?;

    let mut watcher = PollingChangeSource::new();
    watcher.add_watch(&args.source);

    let poll_interval = Duration::from_millis(args.poll_interval_ms.max(10));
    while !shutdown.load(Ordering::SeqCst) {
        watcher.poll();
        while let Some(event) = watcher.next_event() {
            if event.action == "removed" {
                // Deletions are left to reconciliation reporting.
                debug!(path = %event.path.display(), "ignoring removal");
                continue;
            }
            manager.sync_file(&event.path, Priority::Normal);
        }
        thread::sleep(poll_interval);
    }

    info!("shutting down");
    watcher.stop();
    manager.stop();
    Ok(())
}
