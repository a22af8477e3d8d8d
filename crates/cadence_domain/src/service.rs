use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    activity::{validate_name, Activity, ActivityId, OwnerId},
    clock::{Clock, SystemClock},
    config::EngineConfig,
    duration::CanonicalDuration,
    elapsed::measure_elapsed,
    gate::NotificationGate,
    label::LabelPolicy,
    migration::RecurrenceFields,
    notifications::{NotificationRequest, NotificationSink},
    status::{classify, progress, DueStatus},
    store::{ActivityStore, MemoryActivityStore},
};

/// Input for creating an activity. Recurrence arrives in stored-field shape
/// so both the value/unit pair and legacy words pass the same validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewActivity {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub recurrence: RecurrenceFields,
}

/// Partial update; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub recurrence: Option<RecurrenceFields>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub id: ActivityId,
    pub name: String,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub elapsed: CanonicalDuration,
    pub target: CanonicalDuration,
    pub status: DueStatus,
    pub label: String,
    pub progress: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub evaluated: usize,
    pub overdue: usize,
    pub notified: Vec<ActivityId>,
}

pub struct TrackerService {
    store: Arc<dyn ActivityStore>,
    clock: Arc<dyn Clock>,
    gate: NotificationGate,
    notification_sink: Option<Box<dyn NotificationSink>>,
    config: EngineConfig,
    labels: LabelPolicy,
}

pub struct TrackerServiceBuilder {
    store: Option<Arc<dyn ActivityStore>>,
    clock: Option<Arc<dyn Clock>>,
    notification_sink: Option<Box<dyn NotificationSink>>,
    config: EngineConfig,
}

impl TrackerServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            clock: None,
            notification_sink: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ActivityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_notification_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> TrackerService {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryActivityStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let gate = NotificationGate::with_cooldown(Arc::clone(&clock), self.config.cooldown());
        TrackerService {
            store,
            clock,
            gate,
            notification_sink: self.notification_sink,
            labels: self.config.label_policy(),
            config: self.config,
        }
    }
}

impl Default for TrackerServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerService {
    pub fn builder() -> TrackerServiceBuilder {
        TrackerServiceBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    /// Rejects blank names and invalid recurrences before anything is stored.
    #[instrument(skip(self))]
    pub fn create_activity(&self, owner: &OwnerId, new: NewActivity) -> Result<Activity> {
        let name = validate_name(&new.name)?;
        let recurrence = new.recurrence.resolve()?;
        let activity = Activity::new(owner.clone(), name, recurrence)
            .with_description(new.description.trim());
        self.store
            .insert(activity.clone())
            .context("failed to store new activity")?;
        tracing::info!(activity_id = %activity.id, %recurrence, "activity created");
        Ok(activity)
    }

    #[instrument(skip(self))]
    pub fn edit_activity(
        &self,
        owner: &OwnerId,
        id: &ActivityId,
        edit: ActivityEdit,
    ) -> Result<Activity> {
        let mut activity = self.store.get_owned(owner, id)?;
        if let Some(name) = edit.name.as_deref() {
            activity.name = validate_name(name)?;
        }
        if let Some(description) = edit.description {
            activity.description = description.trim().to_string();
        }
        if let Some(fields) = edit.recurrence {
            activity.set_recurrence(fields.resolve()?);
        }
        self.store
            .update(activity.clone())
            .context("failed to store activity edit")?;
        tracing::info!(activity_id = %id, recurrence = %activity.recurrence, "activity edited");
        Ok(activity)
    }

    #[instrument(skip(self))]
    pub fn remove_activity(&self, owner: &OwnerId, id: &ActivityId) -> Result<Activity> {
        self.store.get_owned(owner, id)?;
        let removed = self.store.remove(id)?;
        self.gate.on_completed(id);
        if let Some(sink) = &self.notification_sink {
            sink.clear_for_activity(id);
        }
        tracing::info!(activity_id = %id, "activity removed");
        Ok(removed)
    }

    /// Records a completion at the clock's current instant and re-arms alerts.
    #[instrument(skip(self))]
    pub fn mark_done(&self, owner: &OwnerId, id: &ActivityId) -> Result<Activity> {
        let mut activity = self.store.get_owned(owner, id)?;
        let now = self.clock.now();
        activity.mark_done(now);
        self.store
            .update(activity.clone())
            .context("failed to record completion")?;
        self.gate.on_completed(id);
        if let Some(sink) = &self.notification_sink {
            sink.clear_for_activity(id);
        }
        tracing::info!(activity_id = %id, %now, "activity marked done");
        Ok(activity)
    }

    pub fn report(&self, activity: &Activity, now: DateTime<Utc>) -> ActivityReport {
        let measured = measure_elapsed(activity.last_completed_at, now);
        if let Some(anomaly) = measured.anomaly {
            tracing::warn!(
                activity_id = %activity.id,
                %anomaly,
                "clock anomaly; elapsed clamped to zero"
            );
        }
        let elapsed = measured.duration;
        let target = activity.target();
        ActivityReport {
            id: activity.id.clone(),
            name: activity.name.clone(),
            last_completed_at: activity.last_completed_at,
            elapsed,
            target,
            status: classify(elapsed, target),
            label: self.labels.format(elapsed, target, &activity.recurrence),
            progress: progress(elapsed, target),
        }
    }

    /// Reports for every activity the owner has, most urgent first.
    pub fn dashboard(&self, owner: &OwnerId) -> Result<Vec<ActivityReport>> {
        let now = self.clock.now();
        let mut reports: Vec<ActivityReport> = self
            .store
            .list_for_owner(owner)?
            .iter()
            .map(|activity| self.report(activity, now))
            .collect();
        reports.sort_by(|a, b| {
            b.status
                .urgency()
                .cmp(&a.status.urgency())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(reports)
    }

    /// One pass over every activity at a single instant, alerting through the
    /// sink wherever the gate allows it.
    #[instrument(skip(self))]
    pub fn evaluate(&self) -> Result<EvaluationSummary> {
        let now = self.clock.now();
        let activities = self
            .store
            .list_all()
            .context("failed to list activities for evaluation")?;
        let mut summary = EvaluationSummary {
            evaluated: activities.len(),
            ..EvaluationSummary::default()
        };
        let cooldown = self.config.cooldown();
        for activity in &activities {
            let overdue = self.report(activity, now).status.is_overdue();
            if overdue {
                summary.overdue += 1;
            }
            if self.gate.should_notify_at(&activity.id, overdue, now, cooldown) {
                if let Some(sink) = &self.notification_sink {
                    sink.dispatch(NotificationRequest::due(activity, now));
                }
                summary.notified.push(activity.id.clone());
            }
        }
        let pruned = self.gate.prune(now);
        tracing::debug!(
            evaluated = summary.evaluated,
            overdue = summary.overdue,
            notified = summary.notified.len(),
            pruned,
            "evaluation pass finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gate::GateState;
    use crate::recurrence::InvalidRecurrence;
    use chrono::{Duration, TimeZone};
    use parking_lot::Mutex;

    #[derive(Default, Clone)]
    struct RecordingSink {
        dispatched: Arc<Mutex<Vec<NotificationRequest>>>,
        cleared: Arc<Mutex<Vec<ActivityId>>>,
    }

    impl NotificationSink for RecordingSink {
        fn dispatch(&self, notification: NotificationRequest) {
            self.dispatched.lock().push(notification);
        }

        fn clear_for_activity(&self, activity_id: &ActivityId) {
            self.cleared.lock().push(activity_id.clone());
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 7, 30, 0).unwrap()
    }

    fn setup() -> (Arc<ManualClock>, RecordingSink, TrackerService) {
        let clock = Arc::new(ManualClock::new(t0()));
        let sink = RecordingSink::default();
        let service = TrackerService::builder()
            .with_clock(clock.clone())
            .with_notification_sink(Box::new(sink.clone()))
            .build();
        (clock, sink, service)
    }

    fn every(value: i64, unit: &str) -> NewActivity {
        NewActivity {
            name: "Water plants".into(),
            description: String::new(),
            recurrence: RecurrenceFields::pair(value, unit),
        }
    }

    #[test]
    fn create_rejects_invalid_recurrence_and_blank_names() {
        let (_, _, service) = setup();
        let owner = OwnerId::from("alice");

        let err = service.create_activity(&owner, every(367, "days")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InvalidRecurrence>(),
            Some(InvalidRecurrence::AboveMaximum { .. })
        ));

        let mut blank = every(1, "days");
        blank.name = "   ".into();
        assert!(service.create_activity(&owner, blank).is_err());
        assert!(service.dashboard(&owner).unwrap().is_empty());
    }

    #[test]
    fn new_activity_shows_zero_elapsed_and_never_notifies() {
        let (clock, sink, service) = setup();
        let owner = OwnerId::from("alice");
        service.create_activity(&owner, every(7, "days")).unwrap();
        clock.advance(Duration::days(30));

        let dashboard = service.dashboard(&owner).unwrap();
        assert_eq!(dashboard[0].label, "0min/7d");
        assert!(!dashboard[0].status.is_overdue());

        let summary = service.evaluate().unwrap();
        assert_eq!(summary.overdue, 0);
        assert!(sink.dispatched.lock().is_empty());
    }

    #[test]
    fn evaluation_notifies_once_until_completion() {
        let (clock, sink, service) = setup();
        let owner = OwnerId::from("alice");
        let activity = service.create_activity(&owner, every(1, "day")).unwrap();
        service.mark_done(&owner, &activity.id).unwrap();

        clock.advance(Duration::days(1));
        assert_eq!(service.evaluate().unwrap().notified, vec![activity.id.clone()]);
        clock.advance(Duration::minutes(10));
        assert!(service.evaluate().unwrap().notified.is_empty());
        assert_eq!(sink.dispatched.lock().len(), 1);
        assert_eq!(sink.dispatched.lock()[0].title, "Water plants is due!");

        service.mark_done(&owner, &activity.id).unwrap();
        assert_eq!(service.gate().state(&activity.id, clock.now()), GateState::Armed);
        assert!(sink.cleared.lock().contains(&activity.id));
        assert_eq!(service.evaluate().unwrap().overdue, 0);
    }

    #[test]
    fn editing_recurrence_preserves_completion() {
        let (clock, _, service) = setup();
        let owner = OwnerId::from("alice");
        let activity = service.create_activity(&owner, every(2, "weeks")).unwrap();
        let done = service.mark_done(&owner, &activity.id).unwrap();
        clock.advance(Duration::days(3));

        let edited = service
            .edit_activity(
                &owner,
                &activity.id,
                ActivityEdit {
                    recurrence: Some(RecurrenceFields::legacy("daily")),
                    ..ActivityEdit::default()
                },
            )
            .unwrap();
        assert_eq!(edited.last_completed_at, done.last_completed_at);
        assert_eq!(service.dashboard(&owner).unwrap()[0].label, "3d/1d");

        let rejected = service.edit_activity(
            &owner,
            &activity.id,
            ActivityEdit {
                recurrence: Some(RecurrenceFields::pair(13, "months")),
                ..ActivityEdit::default()
            },
        );
        assert!(rejected.is_err());
        assert_eq!(service.dashboard(&owner).unwrap()[0].label, "3d/1d");
    }

    #[test]
    fn other_owners_cannot_touch_an_activity() {
        let (_, _, service) = setup();
        let activity = service
            .create_activity(&"alice".into(), every(1, "day"))
            .unwrap();
        let mallory = OwnerId::from("mallory");
        assert!(service.mark_done(&mallory, &activity.id).is_err());
        assert!(service.remove_activity(&mallory, &activity.id).is_err());
        assert!(service.dashboard(&mallory).unwrap().is_empty());
    }

    #[test]
    fn dashboard_orders_most_overdue_first() {
        let (clock, _, service) = setup();
        let owner = OwnerId::from("alice");
        let hourly = service.create_activity(&owner, every(1, "hour")).unwrap();
        let mut weekly = every(1, "week");
        weekly.name = "Laundry".into();
        let weekly = service.create_activity(&owner, weekly).unwrap();
        service.mark_done(&owner, &hourly.id).unwrap();
        service.mark_done(&owner, &weekly.id).unwrap();
        clock.advance(Duration::hours(5));

        let dashboard = service.dashboard(&owner).unwrap();
        assert_eq!(dashboard[0].id, hourly.id);
        assert_eq!(dashboard[0].label, "5h/1h");
        assert_eq!(dashboard[1].label, "5h/1w");
    }

    #[test]
    fn future_completion_is_clamped_in_reports() {
        let (clock, _, service) = setup();
        let owner = OwnerId::from("alice");
        let activity = service.create_activity(&owner, every(1, "hour")).unwrap();
        service.mark_done(&owner, &activity.id).unwrap();
        clock.set(t0() - Duration::hours(3));

        let report = &service.dashboard(&owner).unwrap()[0];
        assert_eq!(report.elapsed, CanonicalDuration::ZERO);
        assert!(!report.status.is_overdue());
    }

    #[test]
    fn removing_clears_gate_state() {
        let (clock, sink, service) = setup();
        let owner = OwnerId::from("alice");
        let activity = service.create_activity(&owner, every(1, "hour")).unwrap();
        service.mark_done(&owner, &activity.id).unwrap();
        clock.advance(Duration::hours(2));
        service.evaluate().unwrap();
        assert_eq!(service.gate().len(), 1);

        service.remove_activity(&owner, &activity.id).unwrap();
        assert!(service.gate().is_empty());
        assert_eq!(service.gate().state(&activity.id, clock.now()), GateState::Armed);
        assert_eq!(service.evaluate().unwrap().evaluated, 0);
        assert_eq!(sink.dispatched.lock().len(), 1);
    }

    #[test]
    fn gate_slots_do_not_outlive_their_alerts() {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(MemoryActivityStore::new());
        let service = TrackerService::builder()
            .with_store(store.clone())
            .with_clock(clock.clone())
            .build();
        let owner = OwnerId::from("alice");
        let hourly = service.create_activity(&owner, every(1, "hour")).unwrap();
        let daily = service.create_activity(&owner, every(1, "day")).unwrap();
        assert_eq!(store.len(), 2);
        service.mark_done(&owner, &hourly.id).unwrap();
        service.mark_done(&owner, &daily.id).unwrap();

        clock.advance(Duration::days(1));
        assert_eq!(service.evaluate().unwrap().notified.len(), 2);
        assert_eq!(service.gate().len(), 2);

        service.mark_done(&owner, &hourly.id).unwrap();
        assert_eq!(service.gate().len(), 1);

        service
            .edit_activity(
                &owner,
                &daily.id,
                ActivityEdit {
                    recurrence: Some(RecurrenceFields::pair(2, "weeks")),
                    ..ActivityEdit::default()
                },
            )
            .unwrap();
        clock.advance(Duration::minutes(30));
        assert!(service.evaluate().unwrap().notified.is_empty());
        assert_eq!(service.gate().len(), 1);

        clock.advance(Duration::minutes(31));
        let summary = service.evaluate().unwrap();
        assert_eq!(summary.notified, vec![hourly.id.clone()]);
        assert_eq!(service.gate().len(), 1);
        assert_eq!(service.gate().state(&daily.id, clock.now()), GateState::Armed);
    }

    #[test]
    fn oversized_cooldown_never_breaks_evaluation() {
        let clock = Arc::new(ManualClock::new(t0()));
        let service = TrackerService::builder()
            .with_clock(clock.clone())
            .with_config(EngineConfig {
                cooldown_secs: 10_000_000_000_000,
                ..EngineConfig::default()
            })
            .build();
        let owner = OwnerId::from("alice");
        let activity = service.create_activity(&owner, every(1, "hour")).unwrap();
        service.mark_done(&owner, &activity.id).unwrap();
        clock.advance(Duration::hours(2));

        assert_eq!(service.evaluate().unwrap().notified, vec![activity.id.clone()]);
        assert_eq!(
            service.gate().state(&activity.id, clock.now()),
            GateState::Suppressed {
                armed_until: clock.now() + Duration::days(365)
            }
        );
        clock.advance(Duration::days(364));
        assert!(service.evaluate().unwrap().notified.is_empty());
    }
}
