//! Activity persistence seam and two adapters.

mod json;
mod memory;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::activity::{Activity, ActivityId, OwnerId};
use crate::recurrence::InvalidRecurrence;

pub use json::JsonActivityStore;
pub use memory::MemoryActivityStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("activity `{0}` not found")]
    NotFound(ActivityId),
    #[error("activity `{0}` already exists")]
    Duplicate(ActivityId),
    #[error("activity `{id}` has an invalid recurrence")]
    Recurrence {
        id: ActivityId,
        #[source]
        source: InvalidRecurrence,
    },
    #[error("failed to access activity file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to watch {path} for changes")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("failed to parse activity file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Listing order shared by the adapters: by name, then id.
pub(crate) fn sorted(mut activities: Vec<Activity>) -> Vec<Activity> {
    activities.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    activities
}

/// Where activities live. The engine reads snapshots and reports decisions;
/// only the service writes through this trait.
pub trait ActivityStore: Send + Sync {
    fn insert(&self, activity: Activity) -> StoreResult<()>;

    fn get(&self, id: &ActivityId) -> StoreResult<Activity>;

    /// Replaces an existing activity wholesale.
    fn update(&self, activity: Activity) -> StoreResult<()>;

    fn remove(&self, id: &ActivityId) -> StoreResult<Activity>;

    fn list_for_owner(&self, owner: &OwnerId) -> StoreResult<Vec<Activity>>;

    fn list_all(&self) -> StoreResult<Vec<Activity>>;

    /// Another owner's activity is reported as missing.
    fn get_owned(&self, owner: &OwnerId, id: &ActivityId) -> StoreResult<Activity> {
        let activity = self.get(id)?;
        if &activity.owner != owner {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(activity)
    }
}
