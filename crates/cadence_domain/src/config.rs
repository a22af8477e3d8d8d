use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};

use crate::duration::SECONDS_PER_YEAR;
use crate::gate::DEFAULT_COOLDOWN_SECS;
use crate::label::{LabelPolicy, TargetStyle};

pub const DEFAULT_EVALUATION_INTERVAL_SECS: u64 = 300;
/// Longest accepted re-arm window: one year.
pub const MAX_COOLDOWN_SECS: i64 = SECONDS_PER_YEAR;

/// Tunables for the engine. The re-arm window and the label cascade cutoff
/// are inputs here rather than constants at their use sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cooldown_secs: i64,
    pub label_cutoff: u32,
    pub target_style: TargetStyle,
    pub evaluation_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            label_cutoff: 1,
            target_style: TargetStyle::Configured,
            evaluation_interval_secs: DEFAULT_EVALUATION_INTERVAL_SECS,
        }
    }
}

impl EngineConfig {
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_secs.clamp(0, MAX_COOLDOWN_SECS))
    }

    pub fn evaluation_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.evaluation_interval_secs.max(1))
    }

    pub fn label_policy(&self) -> LabelPolicy {
        LabelPolicy {
            cutoff: self.label_cutoff.max(1),
            target_style: self.target_style,
        }
    }
}
