use crate::{Channel, Error, Result, Stage};
use parking_lot::Mutex;
use portable_atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};

struct Handoff<T> {
    value: T,
    taken: oneshot::Sender<()>,
}

/// Async counterpart of [`Rendezvous`](crate::Rendezvous) for Tokio tasks.
///
/// Values travel over a capacity-one `mpsc` channel together with a
/// `oneshot` acknowledgement, and [`send`](Self::send) resolves only once a
/// receiver has acknowledged taking the value. Receivers take turns on the
/// shared receiver, so each value goes to exactly one of them.
///
/// The channel owns the only long-lived `mpsc::Sender`; senders clone it for
/// the duration of a send. [`close`](Self::close) drops it, so once no send
/// is in flight, waiting receivers see the end of the channel.
pub struct AsyncRendezvous<T> {
    channel: Channel,
    sender: Mutex<Option<mpsc::Sender<Handoff<T>>>>,
    receiver: AsyncMutex<mpsc::Receiver<Handoff<T>>>,
    handoffs: AtomicUsize,
}

impl<T> AsyncRendezvous<T> {
    pub fn new(channel: Channel) -> Self {
        let (sender, receiver) = mpsc::channel(1);
        Self {
            channel,
            sender: Mutex::new(Some(sender)),
            receiver: AsyncMutex::new(receiver),
            handoffs: AtomicUsize::new(0),
        }
    }

    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Hands `value` to a receiver, resolving once one has taken it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the channel was closed before the
    /// send started or the value was dropped untaken.
    pub async fn send(&self, value: T, stage: Stage) -> Result<()> {
        let sender = self.sender.lock().clone().ok_or_else(|| self.closed_by(stage))?;
        let (taken, acknowledged) = oneshot::channel();

        sender
            .send(Handoff { value, taken })
            .await
            .map_err(|_| self.closed_by(stage))?;
        drop(sender);

        acknowledged.await.map_err(|_| self.closed_by(stage))
    }

    /// Takes the next value on offer. Returns `None` once the channel is
    /// closed and no send is in flight.
    pub async fn recv(&self) -> Option<T> {
        let handoff = self.receiver.lock().await.recv().await?;
        self.handoffs.fetch_add(1, Ordering::AcqRel);
        // The sender may have been aborted mid-send; the value is still ours.
        let _ = handoff.taken.send(());
        Some(handoff.value)
    }

    /// Closes the channel and returns the number of completed handoffs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyClosed`] if the channel was closed before.
    pub fn close(&self) -> Result<usize> {
        match self.sender.lock().take() {
            Some(_sender) => Ok(self.handoffs.load(Ordering::Acquire)),
            None => Err(Error::AlreadyClosed {
                channel: self.channel,
            }),
        }
    }

    /// Closes the channel whether or not it was closed before.
    pub fn abort(&self) {
        self.sender.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Number of values that have been taken by a receiver.
    pub fn handoffs(&self) -> usize {
        self.handoffs.load(Ordering::Acquire)
    }

    fn closed_by(&self, stage: Stage) -> Error {
        Error::ChannelClosed {
            channel: self.channel,
            stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn send_resolves_only_after_recv() {
        let channel = Arc::new(AsyncRendezvous::new(Channel::Tickets));
        let sender = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.send(11_usize, Stage::Intake).await })
        };

        sleep(Duration::from_millis(50)).await;
        assert!(!sender.is_finished(), "send resolved without a receiver");
        assert_eq!(channel.handoffs(), 0);

        assert_eq!(channel.recv().await, Some(11));
        sender.await.unwrap().unwrap();
        assert_eq!(channel.handoffs(), 1);
    }

    #[tokio::test]
    async fn close_ends_waiting_receivers() {
        let channel = Arc::new(AsyncRendezvous::<usize>::new(Channel::Pass));
        let receiver = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.recv().await })
        };

        tokio::task::yield_now().await;
        assert_eq!(channel.close(), Ok(0));
        assert_eq!(receiver.await.unwrap(), None);
    }

    #[tokio::test]
    async fn send_after_close_and_double_close_fail() {
        let channel = AsyncRendezvous::new(Channel::Pass);
        channel.close().unwrap();
        assert!(channel.is_closed());

        assert_eq!(
            channel.send((), Stage::Process).await,
            Err(Error::ChannelClosed {
                channel: Channel::Pass,
                stage: Stage::Process,
            })
        );
        assert_eq!(
            channel.close(),
            Err(Error::AlreadyClosed {
                channel: Channel::Pass
            })
        );
    }
}
