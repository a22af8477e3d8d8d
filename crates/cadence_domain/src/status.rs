use serde::{Deserialize, Serialize};

use crate::duration::CanonicalDuration;

/// Binary due state. `Overdue` carries how far past the target the activity is
/// (zero when exactly on the boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DueStatus {
    NotDue { remaining: CanonicalDuration },
    Overdue { by: CanonicalDuration },
}

impl DueStatus {
    pub fn is_overdue(&self) -> bool {
        matches!(self, DueStatus::Overdue { .. })
    }

    /// Sort key: larger means more urgent.
    pub fn urgency(&self) -> i64 {
        match self {
            DueStatus::NotDue { remaining } => -remaining.seconds(),
            DueStatus::Overdue { by } => by.seconds(),
        }
    }
}

/// `Overdue` iff `elapsed >= target`.
pub fn classify(elapsed: CanonicalDuration, target: CanonicalDuration) -> DueStatus {
    if elapsed >= target {
        DueStatus::Overdue {
            by: elapsed - target,
        }
    } else {
        DueStatus::NotDue {
            remaining: target - elapsed,
        }
    }
}

/// Continuous elapsed/target ratio for display. Notification decisions never
/// look at this value.
pub fn progress(elapsed: CanonicalDuration, target: CanonicalDuration) -> f64 {
    if target.is_zero() {
        return 1.0;
    }
    elapsed.seconds() as f64 / target.seconds() as f64
}
