//! tagsense bench simulator
//!
//! Runs a master and its satellites in one process, wired through a
//! loopback bus, and prints every change of the global tag verdict.
//!
//! # Usage
//!
//! ```bash
//! # Write an example bench file
//! tagsense sample-bench > bench.json
//!
//! # Poll ten cycles
//! tagsense simulate --bench bench.json --cycles 10
//!
//! # Poll until Ctrl-C, with bus-level logging
//! RUST_LOG=tagsense_master=trace tagsense simulate --bench bench.json
//! ```

mod bench;

use anyhow::{Context, Result};
use bench::{Bench, BenchConfig};
use clap::{Parser, Subcommand};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tagsense_core::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Bench simulator for the tagsense RFID reader network
#[derive(Parser, Debug)]
#[command(name = "tagsense")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a bench file and print verdict changes
    Simulate {
        /// Bench file (JSON format)
        #[arg(short, long)]
        bench: PathBuf,

        /// Stop after this many poll cycles (default: run until Ctrl-C)
        #[arg(short, long)]
        cycles: Option<u32>,
    },

    /// Print an example bench file
    SampleBench,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { bench, cycles } => simulate(&bench, cycles).await,
        Commands::SampleBench => {
            let sample = BenchConfig::sample()?;
            println!("{}", serde_json::to_string_pretty(&sample)?);
            Ok(())
        }
    }
}

async fn simulate(path: &Path, cycles: Option<u32>) -> Result<()> {
    let config = BenchConfig::load(path)?;
    let Bench {
        mut master,
        script,
        responders,
    } = Bench::build(config)?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            shutdown.cancel();
        }
    });

    for responder in &responders {
        let responder = responder.clone();
        let cancel = cancel.child_token();
        tokio::spawn(async move { responder.watch_changes(cancel).await });
    }

    let offline = match master.initialize_all(&cancel).await {
        Ok(failures) => failures,
        Err(Error::Cancelled) => return Ok(()),
        Err(e) => return Err(e).context("initializing satellites"),
    };
    for (address, e) in &offline {
        println!("satellite {} offline: {}", address, e);
    }
    println!(
        "{} readers online, verdict {}",
        master.global_reader_count(),
        master.global_status()
    );

    let mut changes = master.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => println!(
                    "{}: {} -> {} ({} readings)",
                    change.timestamp.format("%H:%M:%S%.3f"),
                    change.previous,
                    change.current,
                    change.readings
                ),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} verdict changes", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut script_error = None;
    let completed = master
        .run_with(cancel.clone(), |cycle| {
            if cycles.is_some_and(|limit| cycle >= limit) {
                return ControlFlow::Break(());
            }
            match script.apply(cycle) {
                Ok(_) => ControlFlow::Continue(()),
                Err(e) => {
                    script_error = Some(e);
                    ControlFlow::Break(())
                }
            }
        })
        .await;
    cancel.cancel();

    let verdict = master.global_status();
    drop(master);
    printer.await.context("verdict printer")?;
    if let Some(e) = script_error {
        return Err(e).context("applying bench script");
    }

    println!("{} cycles, final verdict {}", completed, verdict);
    for responder in &responders {
        println!(
            "satellite {}: {}",
            responder.address(),
            serde_json::to_string(&responder.stats())?
        );
    }
    Ok(())
}
