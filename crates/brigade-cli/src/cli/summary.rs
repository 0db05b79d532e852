use crate::cli::config::RuntimeKind;
use brigade::{PipelineReport, Tally};
use core::fmt;
use core::time::Duration;

/// What a finished run prints to stdout.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    pub runtime: RuntimeKind,
    #[serde(flatten)]
    pub report: PipelineReport,
    pub elapsed_ms: u64,
    pub tally: Tally,
}

impl RunSummary {
    pub fn new(runtime: RuntimeKind, report: PipelineReport, elapsed: Duration, tally: Tally) -> Self {
        Self {
            runtime,
            report,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            tally,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let runtime = match self.runtime {
            RuntimeKind::Threads => "threads",
            RuntimeKind::Tokio => "tokio",
        };

        writeln!(f, "RUN SUMMARY")?;
        writeln!(f, "runtime={runtime}")?;
        writeln!(f, "orders={}", self.report.orders)?;
        writeln!(f, "tickets={}", self.report.tickets)?;
        writeln!(f, "dishes={}", self.report.dishes)?;
        writeln!(f, "delivered={}", self.report.delivered)?;
        writeln!(f, "elapsed_ms={}", self.elapsed_ms)?;

        for (waiter, taken) in &self.tally.intakes {
            let brought = self.tally.deliveries.get(waiter).copied().unwrap_or(0);
            writeln!(f, "waiter {waiter}: took {taken}, brought {brought}")?;
        }
        for (waiter, brought) in &self.tally.deliveries {
            if !self.tally.intakes.contains_key(waiter) {
                writeln!(f, "waiter {waiter}: took 0, brought {brought}")?;
            }
        }
        for (chef, cooked) in &self.tally.cooked {
            writeln!(f, "chef {chef}: cooked {cooked}")?;
        }

        Ok(())
    }
}
