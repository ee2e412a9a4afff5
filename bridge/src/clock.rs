//! Injected time source.
//!
//! Guests never read the wall clock directly; the `GuestContext` carries a
//! `Clock` so embedders can pin time for deterministic runs.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{BridgeError, BridgeResult};

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always reports the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Fixed clock at `millis` since the Unix epoch.
    pub fn from_millis(millis: i64) -> BridgeResult<Self> {
        from_millis(millis).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Convert epoch milliseconds to a UTC timestamp.
pub fn from_millis(millis: i64) -> BridgeResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(BridgeError::InvalidTimestamp(millis))
}
