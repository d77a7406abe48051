//! Entry point: print a banner, load `.env`, enumerate capture interfaces,
//! open the one the operator picks, and run the pipeline until interrupted.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use netsentry::capture::{self, CaptureHandle, Interface};
use netsentry::config;
use netsentry::emit::{Emitter, Verbosity};
use netsentry::env_file;
use netsentry::pipeline::Pipeline;
use netsentry::stats::persist::resolve_db_path;
use netsentry::stats::CounterRegistry;

/// Prints the numbered interface list and reads the operator's choice.
fn prompt_interface(interfaces: &[Interface]) -> Result<String> {
    for (i, iface) in interfaces.iter().enumerate() {
        match &iface.description {
            Some(desc) => println!("{}. {} ({desc})", i + 1, iface.name),
            None => println!("{}. {}", i + 1, iface.name),
        }
    }
    print!("select an interface: ");
    io::stdout().flush().context("failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read interface selection")?;
    let selection: usize = line
        .trim()
        .parse()
        .ok()
        .filter(|n| (1..=interfaces.len()).contains(n))
        .context("invalid selection")?;
    Ok(interfaces[selection - 1].name.clone())
}

/// Enumerates interfaces, prompts for a selection, and opens it.
fn setup_capture() -> Result<CaptureHandle> {
    let interfaces = capture::list_interfaces().context("failed to enumerate capture interfaces")?;
    if interfaces.is_empty() {
        bail!("no capture interfaces found");
    }
    let chosen = prompt_interface(&interfaces)?;
    capture::open(&chosen).with_context(|| format!("failed to open interface {chosen}"))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netsentry=info".into()),
        )
        .init();

    println!("netsentry — live packet capture and protocol decoding");
    println!("press Ctrl+C to stop\n");

    let loaded = env_file::load(Path::new(".env"));
    tracing::debug!("loaded {loaded} variables from .env");

    let handle = match setup_capture() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    let counters = Arc::new(CounterRegistry::new());
    if let Some(snap) = netsentry::stats::persist::load_snapshot(config::STATS_JSON_PATH) {
        counters.reseed(&snap);
        tracing::info!("restored counters from {}", config::STATS_JSON_PATH);
    }

    let emitter = Arc::new(Emitter::new(Verbosity::Info));
    let db_path = resolve_db_path();

    let pipeline = Pipeline::start(
        handle,
        emitter,
        counters,
        config::STATS_JSON_PATH.to_string(),
        db_path,
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    if let Err(e) =
        signal_hook::flag::register(signal_hook::consts::SIGINT, interrupted.clone())
    {
        eprintln!("failed to register SIGINT handler: {e}");
        return ExitCode::FAILURE;
    }

    while !interrupted.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(200));
    }

    println!("\nshutting down...");
    pipeline.shutdown();
    ExitCode::SUCCESS
}
