//! The pipeline coordinator for the thread runtime.
//!
//! [`Pipeline::run`] launches one intake, one process and one deliver task
//! per order, all at once, each on its own OS thread. Stages hand records to
//! each other over two [`Rendezvous`] channels. Each stage has a
//! [`CompletionBarrier`], and a channel is closed only after the barrier of
//! the stage that sends on it has released:
//!
//! 1. wait for every intake task, close `tickets`;
//! 2. wait for every process task, close `pass`;
//! 3. wait for every deliver task, return.
//!
//! The first stage task that fails, by hitting a closed or drained channel or
//! by panicking, aborts both channels so that every other task returns. The
//! coordinator then panics with `order pipeline aborted:` followed by that
//! failure, which names the channel and stage involved.

use crate::{
    BarrierGuard, Channel, CompletionBarrier, CompletionRecord, DefaultObserver, Error, Event,
    IntakeRecord, Observer, OrderIndex, RandSource, Rendezvous, Result, Roster, Stage,
    ThreadRandom, deliver, intake, process,
};
use core::any::Any;
use parking_lot::Mutex;
use portable_atomic::{AtomicUsize, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, Scope};
#[cfg(feature = "tracing")]
use tracing::instrument;

#[cfg(test)]
mod tests;

/// Stack size for stage threads. Stages only move a record and emit one
/// event.
const STAGE_STACK_SIZE: usize = 256 * 1024;

/// Counts from a completed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineReport {
    /// Orders launched.
    pub orders: usize,
    /// Tickets handed from intake to process when `tickets` was closed.
    pub tickets: usize,
    /// Dishes handed from process to deliver when `pass` was closed.
    pub dishes: usize,
    /// Orders delivered.
    pub delivered: usize,
}

/// Rosters, random source and observer shared by every stage task of a run.
///
/// A `Pipeline` can be run any number of times; runs share nothing but the
/// random source and the observer.
pub struct Pipeline<R = ThreadRandom, O = DefaultObserver> {
    waiters: Roster,
    chefs: Roster,
    rand: R,
    observer: O,
}

impl Pipeline {
    /// Default rosters, thread-local randomness and the
    /// [`DefaultObserver`].
    pub fn new() -> Self {
        Self {
            waiters: Roster::front_of_house(),
            chefs: Roster::back_of_house(),
            rand: ThreadRandom,
            observer: DefaultObserver::default(),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, O> Pipeline<R, O> {
    /// Replaces the rosters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RosterOverlap`] if a worker is on both rosters.
    pub fn with_rosters(self, waiters: Roster, chefs: Roster) -> Result<Self> {
        waiters.ensure_disjoint(&chefs)?;
        Ok(Self {
            waiters,
            chefs,
            ..self
        })
    }

    pub fn with_rand<R2>(self, rand: R2) -> Pipeline<R2, O> {
        Pipeline {
            waiters: self.waiters,
            chefs: self.chefs,
            rand,
            observer: self.observer,
        }
    }

    pub fn with_observer<O2>(self, observer: O2) -> Pipeline<R, O2> {
        Pipeline {
            waiters: self.waiters,
            chefs: self.chefs,
            rand: self.rand,
            observer,
        }
    }

    /// Front-of-house roster: intake and delivery.
    pub const fn waiters(&self) -> &Roster {
        &self.waiters
    }

    /// Back-of-house roster: processing.
    pub const fn chefs(&self) -> &Roster {
        &self.chefs
    }

    pub const fn rand(&self) -> &R {
        &self.rand
    }

    pub const fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }
}

impl<R, O> Pipeline<R, O>
where
    R: RandSource + Sync,
    O: Observer,
{
    /// Runs `order_count` orders through the pipeline and returns once every
    /// one has been delivered.
    ///
    /// With zero orders nothing is launched and no channel is touched.
    ///
    /// # Panics
    ///
    /// Panics with `order pipeline aborted: {err}` if a stage task finds a
    /// channel closed or drained, or panics itself, and if a stage thread
    /// cannot be spawned. Every stage task has returned by then.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn run(&self, order_count: usize) -> PipelineReport {
        if order_count == 0 {
            return PipelineReport::default();
        }

        let run = RunState::new();
        let intaken = CompletionBarrier::new(Stage::Intake);
        let processed = CompletionBarrier::new(Stage::Process);
        let delivered = CompletionBarrier::new(Stage::Deliver);

        thread::scope(|s| {
            let run = &run;

            for order in 0..order_count {
                let launched = spawn_stage(s, run, Stage::Intake, order, intaken.register(), move || {
                    intake(self, order, &run.tickets)
                })
                .and_then(|()| {
                    spawn_stage(s, run, Stage::Process, order, processed.register(), move || {
                        process(self, &run.tickets, &run.pass)
                    })
                })
                .and_then(|()| {
                    spawn_stage(s, run, Stage::Deliver, order, delivered.register(), move || {
                        deliver(self, &run.pass)?;
                        run.served.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    })
                });

                if let Err(err) = launched {
                    run.abort();
                    panic!("order pipeline aborted: failed to spawn stage thread: {err}");
                }
            }

            #[cfg(feature = "tracing")]
            tracing::trace!("Launched {} stage tasks", 3 * order_count);

            intaken.wait();
            let tickets = self.close_channel(Channel::Tickets, run.close(&run.tickets));

            processed.wait();
            let dishes = self.close_channel(Channel::Pass, run.close(&run.pass));

            delivered.wait();
            run.abort_if_failed();

            PipelineReport {
                orders: order_count,
                tickets,
                dishes,
                delivered: run.served.load(Ordering::Relaxed),
            }
        })
    }
}

impl<R, O: Observer> Pipeline<R, O> {
    /// Reports a channel closure, or aborts the run if the close failed.
    pub(crate) fn close_channel(&self, channel: Channel, closed: Result<usize>) -> usize {
        match closed {
            Ok(handoffs) => {
                self.observer.observe(Event::ChannelClosed { channel, handoffs });
                handoffs
            }
            Err(err) => panic!("order pipeline aborted: {err}"),
        }
    }
}

/// Channels and outcome of one threaded run, shared by every stage task.
struct RunState {
    tickets: Rendezvous<IntakeRecord>,
    pass: Rendezvous<CompletionRecord>,
    served: AtomicUsize,
    failure: Mutex<Option<Error>>,
}

impl RunState {
    fn new() -> Self {
        Self {
            tickets: Rendezvous::new(Channel::Tickets),
            pass: Rendezvous::new(Channel::Pass),
            served: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    /// Keeps the first failure and releases every blocked stage task.
    fn fail(&self, err: Error) {
        #[cfg(feature = "tracing")]
        tracing::error!("Stage failed, aborting run: {err}");
        self.failure.lock().get_or_insert(err);
        self.abort();
    }

    fn abort(&self) {
        self.tickets.abort();
        self.pass.abort();
    }

    /// Panics with the first recorded failure, if any.
    fn abort_if_failed(&self) {
        if let Some(err) = self.failure.lock().as_ref() {
            panic!("order pipeline aborted: {err}");
        }
    }

    /// Closes `channel` once its producers are done. A failure recorded
    /// before or during the close wins over the close result, since a failed
    /// run has already aborted the channel.
    fn close<T>(&self, channel: &Rendezvous<T>) -> Result<usize> {
        self.abort_if_failed();
        let closed = channel.close();
        self.abort_if_failed();
        closed
    }
}

/// Spawns one stage task on its own thread. The task reports to its barrier
/// through `guard` however it ends; an error or panic is recorded in `run`.
fn spawn_stage<'scope, F>(
    scope: &'scope Scope<'scope, '_>,
    run: &'scope RunState,
    stage: Stage,
    slot: OrderIndex,
    guard: BarrierGuard<'scope>,
    work: F,
) -> std::io::Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'scope,
{
    thread::Builder::new()
        .name(format!("{stage}-{slot}"))
        .stack_size(STAGE_STACK_SIZE)
        .spawn_scoped(scope, move || {
            let _guard = guard;
            match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => run.fail(err),
                Err(payload) => run.fail(Error::StagePanicked {
                    stage,
                    message: panic_message(payload.as_ref()),
                }),
            }
        })
        .map(drop)
}

/// Text of a panic payload, as far as it has one.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Runs `order_count` orders through a default [`Pipeline`].
pub fn run_pipeline(order_count: usize) -> PipelineReport {
    Pipeline::new().run(order_count)
}
