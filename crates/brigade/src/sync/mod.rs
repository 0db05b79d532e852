//! Blocking synchronization primitives for the thread runtime.
//!
//! - [`Rendezvous`]: a zero-capacity channel with explicit close.
//! - [`CompletionBarrier`]: a wait-group style countdown.

mod barrier;
mod rendezvous;

pub use barrier::*;
pub use rendezvous::*;
