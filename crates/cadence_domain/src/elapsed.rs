use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::duration::CanonicalDuration;

/// A completion timestamp that lies after the evaluation instant.
///
/// Recovered locally by clamping elapsed time to zero; reported so callers
/// can surface upstream clock skew or bad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("last completion {last_completed_at} is {skew} ahead of now ({now})")]
pub struct ClockAnomaly {
    pub last_completed_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub skew: CanonicalDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub duration: CanonicalDuration,
    pub anomaly: Option<ClockAnomaly>,
}

/// Elapsed time since the last completion, with any clock anomaly attached.
///
/// A never-completed activity measures as zero.
pub fn measure_elapsed(last_completed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Elapsed {
    let Some(last) = last_completed_at else {
        return Elapsed {
            duration: CanonicalDuration::ZERO,
            anomaly: None,
        };
    };
    if last > now {
        return Elapsed {
            duration: CanonicalDuration::ZERO,
            anomaly: Some(ClockAnomaly {
                last_completed_at: last,
                now,
                skew: CanonicalDuration::from_chrono(last - now),
            }),
        };
    }
    Elapsed {
        duration: CanonicalDuration::from_chrono(now - last),
        anomaly: None,
    }
}

/// Like [`measure_elapsed`] but logs anomalies and returns only the duration.
pub fn elapsed_since(
    last_completed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> CanonicalDuration {
    let elapsed = measure_elapsed(last_completed_at, now);
    if let Some(anomaly) = elapsed.anomaly {
        tracing::warn!(
            last_completed_at = %anomaly.last_completed_at,
            now = %anomaly.now,
            skew_secs = anomaly.skew.seconds(),
            "completion timestamp is in the future; clamping elapsed to zero"
        );
    }
    elapsed.duration
}
