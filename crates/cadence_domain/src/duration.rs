use std::fmt;
use std::ops::Sub;

use serde::{Deserialize, Serialize};

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
pub const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;
pub const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;
pub const SECONDS_PER_MONTH: i64 = 30 * SECONDS_PER_DAY;
pub const SECONDS_PER_YEAR: i64 = 365 * SECONDS_PER_DAY;

/// A duration counted in whole seconds, the smallest tick the engine knows.
///
/// Every comparison between elapsed time and a recurrence target happens on
/// this scalar. It is never negative.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CanonicalDuration(i64);

impl CanonicalDuration {
    pub const ZERO: Self = Self(0);

    /// Negative inputs clamp to zero.
    pub fn from_seconds(seconds: i64) -> Self {
        Self(seconds.max(0))
    }

    pub fn from_chrono(delta: chrono::Duration) -> Self {
        Self::from_seconds(delta.num_seconds())
    }

    pub fn seconds(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn to_chrono(self) -> chrono::Duration {
        chrono::Duration::seconds(self.0)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self::from_seconds(self.0.saturating_sub(other.0))
    }
}

impl Sub for CanonicalDuration {
    type Output = CanonicalDuration;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for CanonicalDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
