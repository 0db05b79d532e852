//! Console logging for the `brigade` binary.
//!
//! Events from the pipeline and the binary go through `tracing` and are
//! written to stderr by a `tracing_subscriber::fmt` layer, so stdout carries
//! only the run summary. The level filter comes from `RUST_LOG` and defaults
//! to `info`, which shows one line per stage event.
//!
//! ```bash
//! RUST_LOG=debug brigade --orders 10
//! BRIGADE_LOG_FORMAT=json brigade --runtime tokio
//! ```

use crate::cli::config::LogFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_file(true);

    match format {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init()?,
        LogFormat::Json => registry.with(layer.json()).try_init()?,
    }

    Ok(())
}
