use std::collections::HashMap;

use parking_lot::RwLock;

use super::{sorted, ActivityStore, StoreError, StoreResult};
use crate::activity::{Activity, ActivityId, OwnerId};

#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    activities: RwLock<HashMap<ActivityId, Activity>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_activities(activities: impl IntoIterator<Item = Activity>) -> Self {
        let map = activities
            .into_iter()
            .map(|activity| (activity.id.clone(), activity))
            .collect();
        Self {
            activities: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.activities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.read().is_empty()
    }
}

impl ActivityStore for MemoryActivityStore {
    fn insert(&self, activity: Activity) -> StoreResult<()> {
        let mut activities = self.activities.write();
        if activities.contains_key(&activity.id) {
            return Err(StoreError::Duplicate(activity.id));
        }
        activities.insert(activity.id.clone(), activity);
        Ok(())
    }

    fn get(&self, id: &ActivityId) -> StoreResult<Activity> {
        self.activities
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn update(&self, activity: Activity) -> StoreResult<()> {
        let mut activities = self.activities.write();
        let slot = activities
            .get_mut(&activity.id)
            .ok_or_else(|| StoreError::NotFound(activity.id.clone()))?;
        *slot = activity;
        Ok(())
    }

    fn remove(&self, id: &ActivityId) -> StoreResult<Activity> {
        self.activities
            .write()
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn list_for_owner(&self, owner: &OwnerId) -> StoreResult<Vec<Activity>> {
        let activities = self
            .activities
            .read()
            .values()
            .filter(|activity| &activity.owner == owner)
            .cloned()
            .collect();
        Ok(sorted(activities))
    }

    fn list_all(&self) -> StoreResult<Vec<Activity>> {
        Ok(sorted(self.activities.read().values().cloned().collect()))
    }
}
