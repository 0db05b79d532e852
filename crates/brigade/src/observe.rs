//! Observations emitted by the pipeline.
//!
//! Every stage emits exactly one [`Event`] per order, and the coordinator
//! emits one [`Event::ChannelClosed`] per channel. Events go to an
//! [`Observer`], which is shared by all stage tasks.
//!
//! - [`NoopObserver`] drops everything.
//! - [`Recorder`] keeps events in emission order, for inspection after a run.
//! - [`TracingObserver`] (feature `tracing`) logs one line per event.
//!
//! Observers compose as tuples: `(TracingObserver, Recorder::default())` logs
//! and records.

use crate::{Channel, OrderIndex, Stage, Worker};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One observation from a pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum Event {
    /// A waiter took the order and ticketed it for a chef.
    Intake {
        order: OrderIndex,
        waiter: Worker,
        chef: Worker,
    },
    /// A chef cooked the order.
    Process { order: OrderIndex, chef: Worker },
    /// A waiter brought the order out.
    Deliver {
        order: OrderIndex,
        waiter: Worker,
        chef: Worker,
    },
    /// The coordinator closed a channel after `handoffs` completed handoffs.
    ChannelClosed { channel: Channel, handoffs: usize },
}

impl Event {
    /// The stage that emitted this event, `None` for coordinator events.
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Intake { .. } => Some(Stage::Intake),
            Self::Process { .. } => Some(Stage::Process),
            Self::Deliver { .. } => Some(Stage::Deliver),
            Self::ChannelClosed { .. } => None,
        }
    }

    /// The order this event is about, `None` for coordinator events.
    pub const fn order(&self) -> Option<OrderIndex> {
        match self {
            Self::Intake { order, .. } | Self::Process { order, .. } | Self::Deliver { order, .. } => {
                Some(*order)
            }
            Self::ChannelClosed { .. } => None,
        }
    }
}

/// Receives pipeline events. Called concurrently from every stage task.
pub trait Observer: Send + Sync {
    fn observe(&self, event: Event);
}

impl<O: Observer + ?Sized> Observer for Arc<O> {
    fn observe(&self, event: Event) {
        (**self).observe(event);
    }
}

impl<O: Observer + ?Sized> Observer for &O {
    fn observe(&self, event: Event) {
        (**self).observe(event);
    }
}

impl<A: Observer, B: Observer> Observer for (A, B) {
    fn observe(&self, event: Event) {
        self.0.observe(event.clone());
        self.1.observe(event);
    }
}

/// Discards every event.
#[derive(Default, Clone, Copy, Debug)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&self, _event: Event) {}
}

/// Logs every event through `tracing` at `INFO`.
#[cfg(feature = "tracing")]
#[derive(Default, Clone, Copy, Debug)]
pub struct TracingObserver;

#[cfg(feature = "tracing")]
impl Observer for TracingObserver {
    fn observe(&self, event: Event) {
        match event {
            Event::Intake {
                order,
                waiter,
                chef,
            } => tracing::info!(
                stage = "intake",
                order,
                waiter = &*waiter,
                chef = &*chef,
                "Waiter {waiter} takes order {order} to chef {chef}"
            ),
            Event::Process { order, chef } => tracing::info!(
                stage = "process",
                order,
                chef = &*chef,
                "Chef {chef} cooks order {order}"
            ),
            Event::Deliver {
                order,
                waiter,
                chef,
            } => tracing::info!(
                stage = "deliver",
                order,
                waiter = &*waiter,
                chef = &*chef,
                "Waiter {waiter} brings order {order} from chef {chef}"
            ),
            Event::ChannelClosed { channel, handoffs } => tracing::debug!(
                channel = channel.as_str(),
                handoffs,
                "Closed {channel} channel after {handoffs} handoffs"
            ),
        }
    }
}

/// The observer used by [`run_pipeline`](crate::run_pipeline): logs through
/// `tracing` when the feature is on, otherwise drops events.
#[cfg(feature = "tracing")]
pub type DefaultObserver = TracingObserver;

/// The observer used by [`run_pipeline`](crate::run_pipeline): logs through
/// `tracing` when the feature is on, otherwise drops events.
#[cfg(not(feature = "tracing"))]
pub type DefaultObserver = NoopObserver;

/// Records events in the order they were emitted.
///
/// Emission order is a total order consistent with each task's program order
/// and with every channel handoff, so an event that causally precedes another
/// is always recorded first.
#[derive(Default, Debug)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Observer for Recorder {
    fn observe(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl Recorder {
    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events.into_inner()
    }

    /// Order indices seen by `stage`, in emission order.
    pub fn orders_at(&self, stage: Stage) -> Vec<OrderIndex> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.stage() == Some(stage))
            .filter_map(Event::order)
            .collect()
    }

    /// Order indices delivered, in delivery order.
    pub fn deliveries(&self) -> Vec<OrderIndex> {
        self.orders_at(Stage::Deliver)
    }

    /// Position of the event emitted by `stage` for `order`.
    pub fn position(&self, stage: Stage, order: OrderIndex) -> Option<usize> {
        self.events
            .lock()
            .iter()
            .position(|event| event.stage() == Some(stage) && event.order() == Some(order))
    }

    /// Position and handoff count of the closure of `channel`.
    pub fn closure(&self, channel: Channel) -> Option<(usize, usize)> {
        self.events
            .lock()
            .iter()
            .enumerate()
            .find_map(|(pos, event)| match event {
                Event::ChannelClosed {
                    channel: closed,
                    handoffs,
                } if *closed == channel => Some((pos, *handoffs)),
                _ => None,
            })
    }

    /// Stages seen for each order, in emission order.
    pub fn timelines(&self) -> HashMap<OrderIndex, Vec<Stage>> {
        let mut timelines: HashMap<OrderIndex, Vec<Stage>> = HashMap::new();
        for event in self.events.lock().iter() {
            if let (Some(order), Some(stage)) = (event.order(), event.stage()) {
                timelines.entry(order).or_default().push(stage);
            }
        }
        timelines
    }

    /// Per-worker counts over everything recorded so far.
    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for event in self.events.lock().iter() {
            match event {
                Event::Intake { waiter, .. } => {
                    *tally.intakes.entry(Worker::clone(waiter)).or_default() += 1;
                }
                Event::Process { chef, .. } => {
                    *tally.cooked.entry(Worker::clone(chef)).or_default() += 1;
                }
                Event::Deliver { waiter, .. } => {
                    *tally.deliveries.entry(Worker::clone(waiter)).or_default() += 1;
                }
                Event::ChannelClosed { .. } => {}
            }
        }
        tally
    }
}

/// How much work each worker did in a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tally {
    /// Orders taken, per waiter.
    pub intakes: BTreeMap<Worker, usize>,
    /// Orders cooked, per chef.
    pub cooked: BTreeMap<Worker, usize>,
    /// Orders brought out, per waiter.
    pub deliveries: BTreeMap<Worker, usize>,
}
