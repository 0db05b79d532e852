use core::fmt;
use std::sync::Arc;

/// Position of an order in the run, assigned at intake. Orders of a run with
/// `N` orders are numbered `0..N`.
pub type OrderIndex = usize;

/// A worker identity drawn from a [`Roster`](crate::Roster).
///
/// Roster names are shared, so handing one to a record only bumps a refcount.
pub type Worker = Arc<str>;

/// The three stages every order passes through, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Stage {
    Intake,
    Process,
    Deliver,
}

impl Stage {
    pub const ALL: [Self; 3] = [Self::Intake, Self::Process, Self::Deliver];

    /// The state an order is in once this stage has handled it.
    pub const fn reached(self) -> OrderState {
        match self {
            Self::Intake => OrderState::Intaken,
            Self::Process => OrderState::Processed,
            Self::Deliver => OrderState::Delivered,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Process => "process",
            Self::Deliver => "deliver",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two handoff channels of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Channel {
    /// Intake to process: carries [`IntakeRecord`]s.
    Tickets,
    /// Process to deliver: carries [`CompletionRecord`]s.
    Pass,
}

impl Channel {
    /// The stage that sends on this channel.
    pub const fn producer(self) -> Stage {
        match self {
            Self::Tickets => Stage::Intake,
            Self::Pass => Stage::Process,
        }
    }

    /// The stage that receives from this channel.
    pub const fn consumer(self) -> Stage {
        match self {
            Self::Tickets => Stage::Process,
            Self::Pass => Stage::Deliver,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tickets => "tickets",
            Self::Pass => "pass",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single order. Transitions only move forward, one stage at a
/// time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OrderState {
    Pending,
    Intaken,
    Processed,
    Delivered,
}

impl OrderState {
    /// The stage that moves an order out of this state, if any.
    pub const fn next_stage(self) -> Option<Stage> {
        match self {
            Self::Pending => Some(Stage::Intake),
            Self::Intaken => Some(Stage::Process),
            Self::Processed => Some(Stage::Deliver),
            Self::Delivered => None,
        }
    }

    /// Applies `stage` to an order in this state. Returns `None` when `stage`
    /// is not the next one, which would be a skipped or repeated stage.
    pub fn advance(self, stage: Stage) -> Option<Self> {
        (self.next_stage() == Some(stage)).then(|| stage.reached())
    }
}

/// Ticket written by the intake stage: which chef should cook which order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntakeRecord {
    pub chef: Worker,
    pub order: OrderIndex,
}

/// Dish handed over by the process stage, still tagged with the chef that
/// cooked it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompletionRecord {
    pub chef: Worker,
    pub order: OrderIndex,
}

impl From<IntakeRecord> for CompletionRecord {
    fn from(IntakeRecord { chef, order }: IntakeRecord) -> Self {
        Self { chef, order }
    }
}
