use anyhow::bail;
use brigade::{BACK_OF_HOUSE, FRONT_OF_HOUSE, Roster, Station};
use clap::{Parser, ValueEnum};
use core::time::Duration;

/// Which runtime drives the stage tasks.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// One OS thread per stage task.
    Threads,
    /// One Tokio task per stage task.
    Tokio,
}

/// Log output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Runtime configuration for the `brigade` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file in the working directory is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "brigade",
    version,
    about = "Runs orders through a three-stage kitchen pipeline"
)]
pub struct CliArgs {
    /// Number of orders to run through the pipeline.
    ///
    /// Every order gets one intake, one process and one deliver task, all
    /// launched at once.
    ///
    /// Environment variable: `BRIGADE_ORDERS`
    #[arg(long, env = "BRIGADE_ORDERS", default_value_t = 5)]
    pub orders: usize,

    /// Runtime for the stage tasks.
    ///
    /// Environment variable: `BRIGADE_RUNTIME`
    #[arg(long, env = "BRIGADE_RUNTIME", value_enum, default_value_t = RuntimeKind::Threads)]
    pub runtime: RuntimeKind,

    /// Front-of-house roster, comma separated.
    ///
    /// Environment variable: `BRIGADE_WAITERS`
    #[arg(
        long,
        env = "BRIGADE_WAITERS",
        value_delimiter = ',',
        default_values_t = FRONT_OF_HOUSE.map(String::from)
    )]
    pub waiters: Vec<String>,

    /// Back-of-house roster, comma separated.
    ///
    /// Environment variable: `BRIGADE_CHEFS`
    #[arg(
        long,
        env = "BRIGADE_CHEFS",
        value_delimiter = ',',
        default_values_t = BACK_OF_HOUSE.map(String::from)
    )]
    pub chefs: Vec<String>,

    /// Seed for worker selection. When set, every draw goes through one
    /// seeded RNG behind a mutex instead of per-thread RNGs.
    ///
    /// Environment variable: `BRIGADE_SEED`
    #[arg(long, env = "BRIGADE_SEED")]
    pub seed: Option<u64>,

    /// Cancel the run if it has not finished after this many milliseconds.
    /// Only supported with `--runtime tokio`.
    ///
    /// Environment variable: `BRIGADE_DEADLINE_MS`
    #[arg(long, env = "BRIGADE_DEADLINE_MS")]
    pub deadline_ms: Option<u64>,

    /// Log output format. Logs go to stderr.
    ///
    /// Environment variable: `BRIGADE_LOG_FORMAT`
    #[arg(long, env = "BRIGADE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Print the run summary as JSON instead of `key=value` lines.
    #[arg(long, default_value_t = false)]
    pub summary_json: bool,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub orders: usize,
    pub runtime: RuntimeKind,
    pub waiters: Roster,
    pub chefs: Roster,
    pub seed: Option<u64>,
    pub deadline: Option<Duration>,
    pub log_format: LogFormat,
    pub summary_json: bool,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let waiters = Roster::new(Station::FrontOfHouse, args.waiters.iter().map(|s| s.trim()))?;
        let chefs = Roster::new(Station::BackOfHouse, args.chefs.iter().map(|s| s.trim()))?;

        waiters.ensure_disjoint(&chefs)?;

        if args.deadline_ms.is_some() && args.runtime != RuntimeKind::Tokio {
            bail!("BRIGADE_DEADLINE_MS requires the tokio runtime");
        }

        if args.deadline_ms == Some(0) {
            bail!("BRIGADE_DEADLINE_MS must be greater than 0");
        }

        Ok(Self {
            orders: args.orders,
            runtime: args.runtime,
            waiters,
            chefs,
            seed: args.seed,
            deadline: args.deadline_ms.map(Duration::from_millis),
            log_format: args.log_format,
            summary_json: args.summary_json,
        })
    }
}
