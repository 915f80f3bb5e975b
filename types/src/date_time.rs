//! Wire-format timestamp, a thin wrapper over a UTC instant.
//!
//! Kept separate from `chrono::DateTime<Utc>` itself, as in the rest of this
//! workspace, so the wire representation can diverge from the in-process one
//! (OPC UA timestamps are 100ns ticks since 1601) without touching call sites.

use chrono::{DateTime as ChronoDateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::ops::Add;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateTime(ChronoDateTime<Utc>);

impl DateTime {
    pub fn now() -> DateTime {
        DateTime(Utc::now())
    }

    pub fn as_chrono(&self) -> ChronoDateTime<Utc> {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero if `self` is not later.
    pub fn since_ms(&self, earlier: &DateTime) -> i64 {
        self.0.signed_duration_since(earlier.0).num_milliseconds().max(0)
    }
}

impl From<ChronoDateTime<Utc>> for DateTime {
    fn from(dt: ChronoDateTime<Utc>) -> Self {
        DateTime(dt)
    }
}

impl Add<chrono::Duration> for DateTime {
    type Output = DateTime;

    fn add(self, rhs: chrono::Duration) -> DateTime {
        DateTime(self.0 + rhs)
    }
}
