//! `brigade`: runs a batch of orders through the intake, process and deliver
//! stages and prints a summary of who did what.
//!
//! Configuration comes from flags or `BRIGADE_*` environment variables; see
//! `brigade --help`. Stage events are logged to stderr.

mod cli;

use brigade::{
    Pipeline, RandSource, Recorder, SeededRandom, ThreadRandom, TracingObserver,
    run_pipeline_until_cancelled,
};
use clap::Parser;
use cli::config::{CliArgs, RunConfig, RuntimeKind};
use cli::summary::RunSummary;
use cli::telemetry::init_telemetry;
use core::time::Duration;
use std::{sync::Arc, time::Instant};
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for the many short-lived stage threads.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

type SharedRand = Arc<dyn RandSource + Send + Sync>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry(config.log_format)?;
    log_startup_info(&config);

    let rand: SharedRand = match config.seed {
        Some(seed) => Arc::new(SeededRandom::new(seed)),
        None => Arc::new(ThreadRandom),
    };
    let recorder = Arc::new(Recorder::default());
    let pipeline = Arc::new(
        Pipeline::new()
            .with_rosters(config.waiters.clone(), config.chefs.clone())?
            .with_rand(rand)
            .with_observer((TracingObserver, Arc::clone(&recorder))),
    );

    let started = Instant::now();
    let report = match config.runtime {
        RuntimeKind::Threads => {
            let pipeline = Arc::clone(&pipeline);
            let orders = config.orders;
            tokio::task::spawn_blocking(move || pipeline.run(orders)).await?
        }
        RuntimeKind::Tokio => {
            let cancel = CancellationToken::new();
            spawn_cancel_triggers(&cancel, config.deadline);
            let report =
                run_pipeline_until_cancelled(Arc::clone(&pipeline), config.orders, cancel).await;
            report?
        }
    };
    let elapsed = started.elapsed();

    tracing::info!(
        orders = report.orders,
        delivered = report.delivered,
        "Run finished in {:?}",
        elapsed
    );

    let summary = RunSummary::new(config.runtime, report, elapsed, recorder.tally());
    if config.summary_json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{summary}");
    }

    Ok(())
}

fn log_startup_info(config: &RunConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting order pipeline with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting order pipeline with {} orders on {:?} runtime",
            config.orders,
            config.runtime
        );
    }
}

/// Cancels `cancel` on Ctrl+C, or once `deadline` has passed.
fn spawn_cancel_triggers(cancel: &CancellationToken, deadline: Option<Duration>) {
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = on_ctrl_c.cancelled() => {},
            signalled = signal::ctrl_c() => {
                if signalled.is_ok() {
                    tracing::info!("Received Ctrl+C signal, cancelling run");
                    on_ctrl_c.cancel();
                }
            },
        }
    });

    if let Some(deadline) = deadline {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = on_deadline.cancelled() => {},
                () = tokio::time::sleep(deadline) => {
                    tracing::warn!("Run exceeded its {:?} deadline, cancelling", deadline);
                    on_deadline.cancel();
                },
            }
        });
    }
}
