//! Compact "elapsed/target" labels such as `3d/7d` or `0min/1h`.
//!
//! The elapsed side goes through a cascade: pick the largest unit whose whole
//! magnitude reaches the cutoff, floor to an integer, and fall back to
//! minutes below an hour. The target side shows the recurrence as configured,
//! or runs through the same cascade under [`TargetStyle::Cascade`]. Each side
//! picks its unit independently.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::duration::{
    CanonicalDuration, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE, SECONDS_PER_MONTH,
    SECONDS_PER_WEEK, SECONDS_PER_YEAR,
};
use crate::recurrence::{RecurrenceSpec, RecurrenceUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl DisplayUnit {
    /// Largest first.
    const CASCADE: [DisplayUnit; 6] = [
        DisplayUnit::Year,
        DisplayUnit::Month,
        DisplayUnit::Week,
        DisplayUnit::Day,
        DisplayUnit::Hour,
        DisplayUnit::Minute,
    ];

    pub fn seconds(self) -> i64 {
        match self {
            DisplayUnit::Minute => SECONDS_PER_MINUTE,
            DisplayUnit::Hour => SECONDS_PER_HOUR,
            DisplayUnit::Day => SECONDS_PER_DAY,
            DisplayUnit::Week => SECONDS_PER_WEEK,
            DisplayUnit::Month => SECONDS_PER_MONTH,
            DisplayUnit::Year => SECONDS_PER_YEAR,
        }
    }

    pub fn abbrev(self) -> &'static str {
        match self {
            DisplayUnit::Minute => "min",
            DisplayUnit::Hour => "h",
            DisplayUnit::Day => "d",
            DisplayUnit::Week => "w",
            DisplayUnit::Month => "m",
            DisplayUnit::Year => "y",
        }
    }
}

impl From<RecurrenceUnit> for DisplayUnit {
    fn from(unit: RecurrenceUnit) -> Self {
        match unit {
            RecurrenceUnit::Hour => DisplayUnit::Hour,
            RecurrenceUnit::Day => DisplayUnit::Day,
            RecurrenceUnit::Week => DisplayUnit::Week,
            RecurrenceUnit::Month => DisplayUnit::Month,
            RecurrenceUnit::Year => DisplayUnit::Year,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDuration {
    pub value: i64,
    pub unit: DisplayUnit,
}

impl fmt::Display for RenderedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.abbrev())
    }
}

/// How the target half of a label is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStyle {
    /// The recurrence exactly as configured: `(7, day)` renders `7d`.
    #[default]
    Configured,
    /// The target duration through the cascade: `(7, day)` renders `1w`.
    Cascade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelPolicy {
    /// Minimum whole magnitude a unit needs before the cascade selects it.
    pub cutoff: u32,
    pub target_style: TargetStyle,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self {
            cutoff: 1,
            target_style: TargetStyle::Configured,
        }
    }
}

impl LabelPolicy {
    pub fn render(&self, duration: CanonicalDuration) -> RenderedDuration {
        render_duration(duration, self.cutoff)
    }

    pub fn render_target(
        &self,
        target: CanonicalDuration,
        spec: &RecurrenceSpec,
    ) -> RenderedDuration {
        match self.target_style {
            TargetStyle::Configured => RenderedDuration {
                value: i64::from(spec.value()),
                unit: spec.unit().into(),
            },
            TargetStyle::Cascade => self.render(target),
        }
    }

    pub fn format(
        &self,
        elapsed: CanonicalDuration,
        target: CanonicalDuration,
        spec: &RecurrenceSpec,
    ) -> String {
        format!(
            "{}/{}",
            self.render(elapsed),
            self.render_target(target, spec)
        )
    }
}

/// Cascading largest-unit selection shared by both halves of a label.
pub fn render_duration(duration: CanonicalDuration, cutoff: u32) -> RenderedDuration {
    let cutoff = i64::from(cutoff.max(1));
    let seconds = duration.seconds();
    for unit in DisplayUnit::CASCADE {
        let magnitude = seconds / unit.seconds();
        if magnitude >= cutoff {
            return RenderedDuration {
                value: magnitude,
                unit,
            };
        }
    }
    RenderedDuration {
        value: seconds / SECONDS_PER_MINUTE,
        unit: DisplayUnit::Minute,
    }
}

/// Label with the default policy.
pub fn format_label(
    elapsed: CanonicalDuration,
    target: CanonicalDuration,
    spec: &RecurrenceSpec,
) -> String {
    LabelPolicy::default().format(elapsed, target, spec)
}
