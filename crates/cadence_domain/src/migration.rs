//! Adapter from the stored recurrence fields to a single [`RecurrenceSpec`].
//!
//! Records written before value/unit pairs existed only carry a `frequency`
//! word such as `"daily"`. Both shapes are resolved here, once, so nothing
//! downstream ever sees the legacy form.

use serde::{Deserialize, Serialize};

use crate::recurrence::{InvalidRecurrence, RecurrenceSpec, RecurrenceUnit};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_unit: Option<String>,
}

impl RecurrenceFields {
    pub fn pair(value: i64, unit: impl Into<String>) -> Self {
        Self {
            frequency: None,
            frequency_value: Some(value),
            frequency_unit: Some(unit.into()),
        }
    }

    pub fn legacy(frequency: impl Into<String>) -> Self {
        Self {
            frequency: Some(frequency.into()),
            frequency_value: None,
            frequency_unit: None,
        }
    }

    /// Canonical stored shape of a spec: the pair, never the legacy word.
    pub fn from_spec(spec: &RecurrenceSpec) -> Self {
        Self::pair(i64::from(spec.value()), spec.unit().plural())
    }

    pub fn is_legacy(&self) -> bool {
        self.frequency.is_some() && !self.has_pair()
    }

    fn has_pair(&self) -> bool {
        self.frequency_value.is_some() && self.frequency_unit.is_some()
    }

    /// The value/unit pair wins when complete; otherwise the legacy word is
    /// mapped; with nothing set the default of once a day applies.
    pub fn resolve(&self) -> Result<RecurrenceSpec, InvalidRecurrence> {
        if let (Some(value), Some(unit)) = (self.frequency_value, self.frequency_unit.as_deref()) {
            return RecurrenceSpec::parse(value, unit);
        }
        if let Some(word) = self.frequency.as_deref() {
            return parse_legacy_frequency(word);
        }
        if let Some(unit) = self.frequency_unit.as_deref() {
            return RecurrenceSpec::parse(1, unit);
        }
        if let Some(value) = self.frequency_value {
            return RecurrenceSpec::new(value, RecurrenceUnit::Day);
        }
        Ok(RecurrenceSpec::default())
    }
}

pub fn parse_legacy_frequency(word: &str) -> Result<RecurrenceSpec, InvalidRecurrence> {
    let unit = match word.trim().to_ascii_lowercase().as_str() {
        "hourly" => RecurrenceUnit::Hour,
        "daily" => RecurrenceUnit::Day,
        "weekly" => RecurrenceUnit::Week,
        "monthly" => RecurrenceUnit::Month,
        "yearly" | "annually" => RecurrenceUnit::Year,
        _ => return Err(InvalidRecurrence::UnknownLegacyFrequency(word.to_string())),
    };
    RecurrenceSpec::new(1, unit)
}
