use crate::Stage;
use parking_lot::{Condvar, Mutex};

/// Countdown that releases [`wait`](Self::wait) once every registered task
/// has finished. Tasks register with [`add`](Self::add) before they are
/// launched and report with [`done`](Self::done), usually through a
/// [`BarrierGuard`] so that a panicking task still counts down.
pub struct CompletionBarrier {
    stage: Stage,
    remaining: Mutex<usize>,
    released: Condvar,
}

impl CompletionBarrier {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            remaining: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Registers `count` more tasks.
    pub fn add(&self, count: usize) {
        *self.remaining.lock() += count;
    }

    /// Registers one task and returns the guard that reports it done.
    pub fn register(&self) -> BarrierGuard<'_> {
        self.add(1);
        BarrierGuard { barrier: self }
    }

    /// Reports one registered task as finished.
    ///
    /// # Panics
    ///
    /// Panics if no task is registered: more `done` calls than `add`ed.
    pub fn done(&self) {
        let mut remaining = self.remaining.lock();
        assert!(
            *remaining > 0,
            "{} barrier counted down below zero",
            self.stage
        );
        *remaining -= 1;
        if *remaining == 0 {
            self.released.notify_all();
        }
    }

    /// Blocks until every registered task has reported done. Returns at once
    /// if nothing is registered.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.released.wait(&mut remaining);
        }
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }
}

/// Reports its task done on drop.
#[must_use = "dropping the guard reports the task done immediately"]
pub struct BarrierGuard<'a> {
    barrier: &'a CompletionBarrier,
}

impl Drop for BarrierGuard<'_> {
    fn drop(&mut self) {
        self.barrier.done();
    }
}
