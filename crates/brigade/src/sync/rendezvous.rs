use crate::{Channel, Error, Result, Stage};
use parking_lot::{Condvar, Mutex};

struct Slot<T> {
    value: Option<T>,
    offered: usize,
    taken: usize,
    closed: bool,
}

/// A zero-capacity channel: [`send`](Self::send) returns only once a receiver
/// has taken the value.
///
/// The channel holds at most one value in flight. Any number of threads may
/// send and receive. Closing is explicit and belongs to whoever owns the
/// channel, never to a sender or receiver.
pub struct Rendezvous<T> {
    channel: Channel,
    slot: Mutex<Slot<T>>,
    changed: Condvar,
}

impl<T> Rendezvous<T> {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            slot: Mutex::new(Slot {
                value: None,
                offered: 0,
                taken: 0,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Hands `value` to a receiver, blocking until one has taken it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the channel is closed before or
    /// while the value is on offer. The value is dropped in that case.
    pub fn send(&self, value: T, stage: Stage) -> Result<()> {
        let mut slot = self.slot.lock();
        while slot.value.is_some() && !slot.closed {
            self.changed.wait(&mut slot);
        }
        if slot.closed {
            return Err(self.closed_by(stage));
        }

        slot.value = Some(value);
        slot.offered += 1;
        let ticket = slot.offered;
        self.changed.notify_all();

        while slot.taken < ticket && !slot.closed {
            self.changed.wait(&mut slot);
        }
        if slot.taken < ticket {
            // Closed with our value still on offer: take it back.
            slot.value = None;
            self.changed.notify_all();
            return Err(self.closed_by(stage));
        }
        Ok(())
    }

    /// Takes the next value on offer, blocking until a sender offers one.
    /// Returns `None` once the channel is closed and nothing is on offer.
    pub fn recv(&self) -> Option<T> {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.value.take() {
                slot.taken += 1;
                self.changed.notify_all();
                return Some(value);
            }
            if slot.closed {
                return None;
            }
            self.changed.wait(&mut slot);
        }
    }

    /// Closes the channel and returns the number of completed handoffs.
    ///
    /// Blocked senders fail with [`Error::ChannelClosed`] and blocked
    /// receivers get `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if the channel was closed before.
    pub fn close(&self) -> Result<usize> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return Err(Error::AlreadyClosed {
                channel: self.channel,
            });
        }
        slot.closed = true;
        self.changed.notify_all();
        Ok(slot.taken)
    }

    /// Closes the channel whether or not it was closed before, waking every
    /// blocked sender and receiver. Used to tear a run down.
    pub fn abort(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Number of values that have been taken by a receiver.
    pub fn handoffs(&self) -> usize {
        self.slot.lock().taken
    }

    fn closed_by(&self, stage: Stage) -> Error {
        Error::ChannelClosed {
            channel: self.channel,
            stage,
        }
    }
}
