//! Wall-clock abstraction
//!
//! The coordinator times signature collection and the ledger checks the
//! validity window; both read time through [`Clock`] so either can run
//! against a controlled clock.

use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;
use std::rc::Rc;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// Every read returns the current instant and then advances it by `step`
/// (zero by default). Clones share the same instant.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
    step: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::stepping(start, Duration::zero())
    }

    pub fn stepping(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
            step,
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.now.set(instant);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Current instant without stepping
    pub fn peek(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let current = self.now.get();
        self.now.set(current + self.step);
        current
    }
}
