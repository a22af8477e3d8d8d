use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::{
    CanonicalDuration, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MONTH, SECONDS_PER_WEEK,
    SECONDS_PER_YEAR,
};

/// Rejection raised when a recurrence cannot be accepted at a write boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRecurrence {
    #[error("recurrence value must be at least 1, got {value}")]
    BelowMinimum { value: i64 },
    #[error("recurrence value {value} exceeds the maximum of {max} for unit `{unit}`")]
    AboveMaximum {
        value: i64,
        unit: RecurrenceUnit,
        max: u32,
    },
    #[error("unknown recurrence unit `{0}`")]
    UnknownUnit(String),
    #[error("unknown legacy frequency `{0}`")]
    UnknownLegacyFrequency(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    #[serde(alias = "hours")]
    Hour,
    #[serde(alias = "days")]
    Day,
    #[serde(alias = "weeks")]
    Week,
    #[serde(alias = "months")]
    Month,
    #[serde(alias = "years")]
    Year,
}

impl RecurrenceUnit {
    pub const ALL: [RecurrenceUnit; 5] = [
        RecurrenceUnit::Hour,
        RecurrenceUnit::Day,
        RecurrenceUnit::Week,
        RecurrenceUnit::Month,
        RecurrenceUnit::Year,
    ];

    /// Largest value accepted for this unit; every unit accepts at least 1.
    pub fn max_value(self) -> u32 {
        match self {
            RecurrenceUnit::Hour => 8760,
            RecurrenceUnit::Day => 366,
            RecurrenceUnit::Week => 52,
            RecurrenceUnit::Month => 12,
            RecurrenceUnit::Year => 1,
        }
    }

    /// Fixed-length approximation: months are 30 days, years 365 days.
    pub fn seconds(self) -> i64 {
        match self {
            RecurrenceUnit::Hour => SECONDS_PER_HOUR,
            RecurrenceUnit::Day => SECONDS_PER_DAY,
            RecurrenceUnit::Week => SECONDS_PER_WEEK,
            RecurrenceUnit::Month => SECONDS_PER_MONTH,
            RecurrenceUnit::Year => SECONDS_PER_YEAR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecurrenceUnit::Hour => "hour",
            RecurrenceUnit::Day => "day",
            RecurrenceUnit::Week => "week",
            RecurrenceUnit::Month => "month",
            RecurrenceUnit::Year => "year",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            RecurrenceUnit::Hour => "hours",
            RecurrenceUnit::Day => "days",
            RecurrenceUnit::Week => "weeks",
            RecurrenceUnit::Month => "months",
            RecurrenceUnit::Year => "years",
        }
    }
}

impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceUnit {
    type Err = InvalidRecurrence;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "h" | "hour" | "hours" => Ok(RecurrenceUnit::Hour),
            "d" | "day" | "days" => Ok(RecurrenceUnit::Day),
            "w" | "week" | "weeks" => Ok(RecurrenceUnit::Week),
            "m" | "month" | "months" => Ok(RecurrenceUnit::Month),
            "y" | "year" | "years" => Ok(RecurrenceUnit::Year),
            _ => Err(InvalidRecurrence::UnknownUnit(raw.to_string())),
        }
    }
}

/// "Every `value` `unit`s", validated against the per-unit bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRecurrence")]
pub struct RecurrenceSpec {
    value: u32,
    unit: RecurrenceUnit,
}

#[derive(Deserialize)]
struct RawRecurrence {
    value: i64,
    unit: RecurrenceUnit,
}

impl TryFrom<RawRecurrence> for RecurrenceSpec {
    type Error = InvalidRecurrence;

    fn try_from(raw: RawRecurrence) -> Result<Self, Self::Error> {
        RecurrenceSpec::new(raw.value, raw.unit)
    }
}

impl RecurrenceSpec {
    pub fn new(value: i64, unit: RecurrenceUnit) -> Result<Self, InvalidRecurrence> {
        if value < 1 {
            return Err(InvalidRecurrence::BelowMinimum { value });
        }
        let max = unit.max_value();
        if value > i64::from(max) {
            return Err(InvalidRecurrence::AboveMaximum { value, unit, max });
        }
        Ok(Self {
            value: value as u32,
            unit,
        })
    }

    /// Parses the unit leniently (`"days"`, `"day"`, `"d"`) before validating.
    pub fn parse(value: i64, unit: &str) -> Result<Self, InvalidRecurrence> {
        Self::new(value, unit.parse()?)
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn unit(&self) -> RecurrenceUnit {
        self.unit
    }

    pub fn to_canonical(&self) -> CanonicalDuration {
        CanonicalDuration::from_seconds(i64::from(self.value) * self.unit.seconds())
    }
}

impl Default for RecurrenceSpec {
    fn default() -> Self {
        Self {
            value: 1,
            unit: RecurrenceUnit::Day,
        }
    }
}

impl fmt::Display for RecurrenceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value == 1 {
            write!(f, "every {}", self.unit.as_str())
        } else {
            write!(f, "every {} {}", self.value, self.unit.plural())
        }
    }
}

/// Converts a (value, unit) pair into its canonical duration.
pub fn normalize(value: i64, unit: RecurrenceUnit) -> Result<CanonicalDuration, InvalidRecurrence> {
    RecurrenceSpec::new(value, unit).map(|spec| spec.to_canonical())
}

/// Same as [`normalize`], for units that arrive as free text.
pub fn normalize_raw(value: i64, unit: &str) -> Result<CanonicalDuration, InvalidRecurrence> {
    RecurrenceSpec::parse(value, unit).map(|spec| spec.to_canonical())
}
