//! Time source

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::Timestamp;

/// Supplies the current time to every time-dependent operation
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time in seconds since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Settable clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    time: Rc<Cell<Timestamp>>,
}

impl ManualClock {
    pub fn new(time: Timestamp) -> Self {
        Self {
            time: Rc::new(Cell::new(time)),
        }
    }

    pub fn set(&self, time: Timestamp) {
        self.time.set(time);
    }

    pub fn advance(&self, seconds: u64) {
        self.time.set(self.time.get().saturating_add(seconds));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.time.get()
    }
}
