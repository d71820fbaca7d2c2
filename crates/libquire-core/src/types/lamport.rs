//! Lamport logical clocks
//!
//! Versions of an entity are ordered by lamport time rather than wall-clock
//! time. A repository keeps one clock per entity namespace; local edits
//! increment it and merged remote histories are witnessed into it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A point in logical time
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LamportTime(pub u64);

impl LamportTime {
    /// The following time, `None` once the clock is exhausted
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(LamportTime)
    }
}

impl fmt::Display for LamportTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// In-memory lamport clock, safe to share between threads
#[derive(Debug, Default)]
pub struct MemClock {
    value: AtomicU64,
}

impl MemClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time(time: LamportTime) -> Self {
        Self {
            value: AtomicU64::new(time.0),
        }
    }

    /// Current time
    pub fn time(&self) -> LamportTime {
        LamportTime(self.value.load(Ordering::SeqCst))
    }

    /// Advance the clock and return the new time.
    ///
    /// Returns `None` and leaves the clock alone when it sits at `u64::MAX`.
    pub fn increment(&self) -> Option<LamportTime> {
        self.value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| t.checked_add(1))
            .ok()
            .map(|previous| LamportTime(previous + 1))
    }

    /// Move the clock forward to at least `time`
    pub fn witness(&self, time: LamportTime) {
        self.value.fetch_max(time.0, Ordering::SeqCst);
    }
}
