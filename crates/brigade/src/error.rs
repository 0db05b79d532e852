//! Error types for the order pipeline.
//!
//! Nothing in a correctly coordinated run produces an [`Error`]. The variants
//! describe broken coordination (a send after close, a double close, a
//! receive that found a drained channel), a stage task that panicked, bad
//! construction input (an empty roster), or a cancelled async run.
//!
//! A run stops at the first stage failure of any kind and the coordinator
//! panics with `order pipeline aborted: {err}`.
//! [`Error::is_invariant_violation`] tells the coordination variants apart
//! from the others.

use crate::{Channel, Stage};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors the pipeline can report.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A stage tried to send on a channel that was already closed.
    #[error("{stage} stage sent on closed {channel} channel")]
    ChannelClosed { channel: Channel, stage: Stage },

    /// The coordinator closed a channel twice.
    #[error("{channel} channel closed twice")]
    AlreadyClosed { channel: Channel },

    /// A stage waited for a record but the channel closed with nothing left.
    #[error("{stage} stage found {channel} channel closed and drained")]
    Drained { channel: Channel, stage: Stage },

    /// A roster was built without any workers.
    #[error("{station} roster has no workers")]
    EmptyRoster { station: crate::Station },

    /// A roster listed a worker whose name is empty or only whitespace.
    #[error("{station} roster lists a blank worker name")]
    BlankWorker { station: crate::Station },

    /// A roster listed the same worker twice.
    #[error("{station} roster lists worker {name:?} more than once")]
    DuplicateWorker {
        station: crate::Station,
        name: String,
    },

    /// A worker was listed on both the front-of-house and back-of-house
    /// rosters.
    #[error("worker {name:?} is on both rosters")]
    RosterOverlap { name: String },

    /// A stage task panicked, for example inside an observer.
    #[error("{stage} task panicked: {message}")]
    StagePanicked { stage: Stage, message: String },

    /// The run was cancelled before every order was delivered.
    #[error("pipeline run cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` for errors that mean the coordinator broke the
    /// close-after-producers invariant. These abort the run.
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::ChannelClosed { .. } | Self::AlreadyClosed { .. } | Self::Drained { .. }
        )
    }
}
