//! Worker rosters and random identity selection.
//!
//! A [`Roster`] is an immutable, non-empty list of interchangeable workers for
//! one [`Station`]. Every stage invocation draws its worker independently and
//! with replacement through a [`RandSource`], so many concurrent orders can be
//! handled by the same worker.
//!
//! Two sources are provided:
//!
//! - [`ThreadRandom`]: each OS thread draws from its own thread-local RNG.
//!   Nothing is shared, nothing contends.
//! - [`SeededRandom`]: one seeded RNG behind a mutex. Assignments are
//!   reproducible for a given seed and schedule.

use crate::{Error, Result, Worker};
use core::fmt;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rng, rngs::StdRng};
use std::collections::HashSet;
use std::sync::Arc;

/// Waiters on the floor.
pub const FRONT_OF_HOUSE: [&str; 3] = ["A", "B", "C"];

/// Chefs in the kitchen.
pub const BACK_OF_HOUSE: [&str; 3] = ["Jack", "Bob", "Mark"];

/// Where a roster works.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Station {
    /// Waiters: take orders at intake and bring them out at delivery.
    FrontOfHouse,
    /// Chefs: cook orders in the process stage.
    BackOfHouse,
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FrontOfHouse => "front-of-house",
            Self::BackOfHouse => "back-of-house",
        })
    }
}

/// A source of uniform random indices, shareable across stage tasks.
pub trait RandSource {
    /// Returns an index drawn uniformly from `0..len`. `len` is never zero.
    fn index(&self, len: usize) -> usize;
}

impl<R: RandSource + ?Sized> RandSource for Arc<R> {
    fn index(&self, len: usize) -> usize {
        (**self).index(len)
    }
}

/// A `RandSource` that uses the thread-local RNG (`rand::rng()`).
///
/// The type is zero-sized and never stores the RNG, so it can be shared by
/// every stage task while each OS thread draws from its own generator.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource for ThreadRandom {
    fn index(&self, len: usize) -> usize {
        rng().random_range(0..len)
    }
}

/// A `RandSource` backed by a single seeded RNG guarded by a mutex.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandSource for SeededRandom {
    fn index(&self, len: usize) -> usize {
        self.rng.lock().random_range(0..len)
    }
}

/// An immutable, non-empty set of interchangeable workers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roster {
    station: Station,
    workers: Arc<[Worker]>,
}

impl Roster {
    /// Builds a roster for `station`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyRoster`] if `names` is empty,
    /// [`Error::BlankWorker`] if a name is empty after trimming and
    /// [`Error::DuplicateWorker`] if a name appears twice.
    pub fn new<I, S>(station: Station, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut workers = Vec::new();
        for name in names {
            let name = name.as_ref();
            if name.trim().is_empty() {
                return Err(Error::BlankWorker { station });
            }
            if !seen.insert(name.to_owned()) {
                return Err(Error::DuplicateWorker {
                    station,
                    name: name.to_owned(),
                });
            }
            workers.push(Worker::from(name));
        }

        if workers.is_empty() {
            return Err(Error::EmptyRoster { station });
        }

        Ok(Self {
            station,
            workers: workers.into(),
        })
    }

    /// The default waiters, [`FRONT_OF_HOUSE`].
    pub fn front_of_house() -> Self {
        Self::from_static(Station::FrontOfHouse, &FRONT_OF_HOUSE)
    }

    /// The default chefs, [`BACK_OF_HOUSE`].
    pub fn back_of_house() -> Self {
        Self::from_static(Station::BackOfHouse, &BACK_OF_HOUSE)
    }

    fn from_static(station: Station, names: &[&str]) -> Self {
        Self {
            station,
            workers: names.iter().map(|&name| Worker::from(name)).collect(),
        }
    }

    pub const fn station(&self) -> Station {
        self.station
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workers.iter().any(|worker| &**worker == name)
    }

    /// Checks that no worker appears on both rosters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RosterOverlap`] naming the first shared worker.
    pub fn ensure_disjoint(&self, other: &Self) -> Result<()> {
        match self.workers.iter().find(|worker| other.contains(worker)) {
            Some(name) => Err(Error::RosterOverlap {
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Picks one worker uniformly at random.
    pub fn select<R: RandSource + ?Sized>(&self, rand: &R) -> Worker {
        select_from_roster(&self.workers, rand)
    }
}

/// Picks one worker from a non-empty `roster` with a uniform draw over its
/// indices.
///
/// # Panics
///
/// Panics if `roster` is empty. [`Roster`] never is.
pub fn select_from_roster<R: RandSource + ?Sized>(roster: &[Worker], rand: &R) -> Worker {
    assert!(!roster.is_empty(), "cannot select from an empty roster");
    Worker::clone(&roster[rand.index(roster.len())])
}
