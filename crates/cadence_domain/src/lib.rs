pub mod activity;
pub mod clock;
pub mod config;
pub mod duration;
pub mod elapsed;
pub mod gate;
pub mod label;
pub mod migration;
pub mod monitor;
pub mod notifications;
pub mod recurrence;
pub mod service;
pub mod status;
pub mod store;

pub use crate::activity::{Activity, ActivityId, OwnerId};
pub use crate::config::EngineConfig;
pub use crate::duration::CanonicalDuration;
pub use crate::label::format_label;
pub use crate::recurrence::{normalize, InvalidRecurrence, RecurrenceSpec, RecurrenceUnit};
pub use crate::service::{TrackerService, TrackerServiceBuilder};
pub use crate::status::{classify, DueStatus};
