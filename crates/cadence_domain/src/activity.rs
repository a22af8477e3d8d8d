use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::duration::CanonicalDuration;
use crate::elapsed::elapsed_since;
use crate::recurrence::RecurrenceSpec;
use crate::status::{classify, DueStatus};

/// Opaque, stable identity of an activity. Keys the notification gate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(String);

impl ActivityId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActivityId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for ActivityId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidActivity {
    #[error("activity name must not be empty")]
    EmptyName,
}

/// Trims the name and rejects blanks.
pub fn validate_name(raw: &str) -> Result<String, InvalidActivity> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(InvalidActivity::EmptyName);
    }
    Ok(name.to_string())
}

/// A recurring personal activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub owner: OwnerId,
    pub name: String,
    pub description: String,
    pub recurrence: RecurrenceSpec,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl Activity {
    /// A fresh activity that has never been completed.
    pub fn new(owner: OwnerId, name: impl Into<String>, recurrence: RecurrenceSpec) -> Self {
        Self::with_id(ActivityId::generate(), owner, name, recurrence)
    }

    pub fn with_id(
        id: ActivityId,
        owner: OwnerId,
        name: impl Into<String>,
        recurrence: RecurrenceSpec,
    ) -> Self {
        Self {
            id,
            owner,
            name: name.into(),
            description: String::new(),
            recurrence,
            last_completed_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn mark_done(&mut self, now: DateTime<Utc>) {
        self.last_completed_at = Some(now);
    }

    /// Replaces the recurrence; the completion timestamp is kept.
    pub fn set_recurrence(&mut self, recurrence: RecurrenceSpec) {
        self.recurrence = recurrence;
    }

    /// Derived from the current recurrence on every call.
    pub fn target(&self) -> CanonicalDuration {
        self.recurrence.to_canonical()
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> CanonicalDuration {
        elapsed_since(self.last_completed_at, now)
    }

    pub fn status(&self, now: DateTime<Utc>) -> DueStatus {
        classify(self.elapsed(now), self.target())
    }
}
