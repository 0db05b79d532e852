//! A three-stage order pipeline.
//!
//! Every order passes through `intake`, `process` and `deliver`, each stage
//! run on its own task and performed by a worker picked at random from a
//! fixed roster. Stages hand records to each other over zero-capacity
//! [`Rendezvous`] channels, and the coordinator closes a channel only after
//! the [`CompletionBarrier`] of its producing stage has released.
//!
//! ```
//! use brigade::{Pipeline, Recorder};
//!
//! let pipeline = Pipeline::new().with_observer(Recorder::default());
//! let report = pipeline.run(5);
//!
//! assert_eq!(report.delivered, 5);
//! assert_eq!(pipeline.observer().deliveries().len(), 5);
//! ```

mod error;
mod observe;
mod pipeline;
mod record;
mod roster;
#[cfg(feature = "async-tokio")]
mod runtime;
mod stage;
mod sync;

pub use crate::error::*;
pub use crate::observe::*;
pub use crate::pipeline::*;
pub use crate::record::*;
pub use crate::roster::*;
#[cfg(feature = "async-tokio")]
pub use crate::runtime::*;
pub use crate::stage::*;
pub use crate::sync::*;
