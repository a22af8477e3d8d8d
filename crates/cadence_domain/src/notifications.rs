use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{Activity, ActivityId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub activity_id: ActivityId,
    pub title: String,
    pub body: String,
    pub scheduled_for: DateTime<Utc>,
}

impl NotificationRequest {
    pub fn due(activity: &Activity, now: DateTime<Utc>) -> Self {
        Self {
            activity_id: activity.id.clone(),
            title: format!("{} is due!", activity.name),
            body: format!("It's time to complete \"{}\".", activity.name),
            scheduled_for: now,
        }
    }
}

/// Platform-specific alert channels implement this trait.
pub trait NotificationSink: Send + Sync {
    fn dispatch(&self, notification: NotificationRequest);
    fn clear_for_activity(&self, activity_id: &ActivityId);
}

/// Sink that only writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn dispatch(&self, notification: NotificationRequest) {
        tracing::info!(
            activity_id = %notification.activity_id,
            at = %notification.scheduled_for,
            "{}: {}",
            notification.title,
            notification.body
        );
    }

    fn clear_for_activity(&self, activity_id: &ActivityId) {
        tracing::debug!(%activity_id, "cleared pending alerts");
    }
}
