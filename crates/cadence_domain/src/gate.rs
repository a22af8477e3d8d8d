//! Per-activity alert de-duplication.
//!
//! Each activity identity owns one slot. A slot is `Armed` (may fire) or
//! `Suppressed` until `armed_until`. Calls for the same identity serialize on
//! the slot's mutex; calls for different identities only share the map's read
//! lock. Nothing here survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityId;
use crate::clock::Clock;

pub const DEFAULT_COOLDOWN_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    Armed,
    Suppressed { armed_until: DateTime<Utc> },
}

#[derive(Debug, Default)]
struct Slot {
    armed_until: Option<DateTime<Utc>>,
}

impl Slot {
    fn live_record(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.armed_until.filter(|until| now < *until)
    }
}

pub struct NotificationGate {
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    slots: RwLock<HashMap<ActivityId, Arc<Mutex<Slot>>>>,
}

impl NotificationGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_cooldown(clock, Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }

    pub fn with_cooldown(clock: Arc<dyn Clock>, cooldown: Duration) -> Self {
        Self {
            cooldown,
            clock,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Decides against the injected clock and the configured cooldown.
    pub fn should_notify(&self, id: &ActivityId, overdue: bool) -> bool {
        self.should_notify_at(id, overdue, self.clock.now(), self.cooldown)
    }

    /// Returns true, and suppresses the identity until `now + cooldown`, only
    /// when `overdue` holds and the identity is currently armed.
    pub fn should_notify_at(
        &self,
        id: &ActivityId,
        overdue: bool,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> bool {
        if !overdue {
            return false;
        }
        let slot = self.slot(id);
        let mut slot = slot.lock();
        if let Some(until) = slot.live_record(now) {
            tracing::trace!(activity_id = %id, %until, "notification suppressed");
            return false;
        }
        let until = now
            .checked_add_signed(cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        slot.armed_until = Some(until);
        tracing::debug!(activity_id = %id, armed_until = %until, "notification gate fired");
        true
    }

    /// Re-arms the identity immediately, whatever its state. The slot is
    /// dropped unless a concurrent caller still holds it, in which case it is
    /// cleared in place.
    pub fn on_completed(&self, id: &ActivityId) {
        let shared = {
            let mut slots = self.slots.write();
            let Some(slot) = slots.get(id) else {
                return;
            };
            if Arc::strong_count(slot) == 1 {
                slots.remove(id);
                None
            } else {
                Some(Arc::clone(slot))
            }
        };
        if let Some(slot) = shared {
            slot.lock().armed_until = None;
        }
        tracing::debug!(activity_id = %id, "notification gate re-armed on completion");
    }

    pub fn state(&self, id: &ActivityId, now: DateTime<Utc>) -> GateState {
        let existing = self.slots.read().get(id).cloned();
        let live = existing.and_then(|slot| {
            let slot = slot.lock();
            slot.live_record(now)
        });
        match live {
            Some(armed_until) => GateState::Suppressed { armed_until },
            None => GateState::Armed,
        }
    }

    /// Number of identities with a slot, live or expired.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Number of identities currently suppressed at `now`.
    pub fn live_records(&self, now: DateTime<Utc>) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.lock().live_record(now).is_some())
            .count()
    }

    /// Drops slots with no live record that no caller is holding.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|_, slot| {
            Arc::strong_count(slot) > 1 || slot.lock().live_record(now).is_some()
        });
        before - slots.len()
    }

    fn slot(&self, id: &ActivityId) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.slots.read().get(id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(id.clone()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn setup() -> (Arc<ManualClock>, NotificationGate) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        let gate = NotificationGate::new(clock.clone());
        (clock, gate)
    }

    #[test]
    fn fires_once_per_cooldown_window() {
        let (clock, gate) = setup();
        let id = ActivityId::from("water-plants");

        assert!(gate.should_notify(&id, true));
        clock.advance(Duration::minutes(1));
        assert!(!gate.should_notify(&id, true));
        clock.advance(Duration::minutes(58));
        assert!(!gate.should_notify(&id, true));
        clock.advance(Duration::minutes(1));
        assert!(gate.should_notify(&id, true));
    }

    #[test]
    fn not_overdue_never_fires_or_changes_state() {
        let (clock, gate) = setup();
        let id = ActivityId::from("stretch");
        assert!(!gate.should_notify(&id, false));
        assert_eq!(gate.state(&id, clock.now()), GateState::Armed);
        assert!(gate.should_notify(&id, true));
    }

    #[test]
    fn completion_rearms_before_cooldown_expires() {
        let (clock, gate) = setup();
        let id = ActivityId::from("vacuum");
        assert!(gate.should_notify(&id, true));
        assert!(matches!(
            gate.state(&id, clock.now()),
            GateState::Suppressed { .. }
        ));

        gate.on_completed(&id);
        gate.on_completed(&id);
        assert_eq!(gate.state(&id, clock.now()), GateState::Armed);
        assert!(gate.should_notify(&id, true));
    }

    #[test]
    fn completion_drops_the_slot() {
        let (_clock, gate) = setup();
        let id = ActivityId::from("floss");
        assert!(gate.should_notify(&id, true));
        assert_eq!(gate.len(), 1);
        gate.on_completed(&id);
        assert!(gate.is_empty());
        assert!(gate.should_notify(&id, true));
    }

    #[test]
    fn cooldown_past_the_calendar_end_saturates() {
        let (clock, gate) = setup();
        let id = ActivityId::from("forever");
        let now = clock.now();
        let huge = Duration::days(365 * 1_000_000);
        assert!(gate.should_notify_at(&id, true, now, huge));
        assert_eq!(
            gate.state(&id, now),
            GateState::Suppressed {
                armed_until: DateTime::<Utc>::MAX_UTC
            }
        );
        assert!(!gate.should_notify_at(&id, true, now + Duration::days(365), huge));
        gate.on_completed(&id);
        assert_eq!(gate.state(&id, now), GateState::Armed);
    }

    #[test]
    fn completion_of_unknown_identity_is_a_no_op() {
        let (clock, gate) = setup();
        gate.on_completed(&ActivityId::from("never-seen"));
        assert_eq!(gate.live_records(clock.now()), 0);
    }

    #[test]
    fn identities_are_independent() {
        let (_clock, gate) = setup();
        let a = ActivityId::from("a");
        let b = ActivityId::from("b");
        assert!(gate.should_notify(&a, true));
        assert!(gate.should_notify(&b, true));
        assert!(!gate.should_notify(&a, true));
    }

    #[test]
    fn explicit_cooldown_overrides_default() {
        let (clock, gate) = setup();
        let id = ActivityId::from("short");
        let now = clock.now();
        assert!(gate.should_notify_at(&id, true, now, Duration::minutes(5)));
        let cooldown = Duration::minutes(5);
        assert!(!gate.should_notify_at(&id, true, now + Duration::minutes(4), cooldown));
        assert!(gate.should_notify_at(&id, true, now + Duration::minutes(5), cooldown));
    }

    #[test]
    fn prune_drops_expired_slots() {
        let (clock, gate) = setup();
        let a = ActivityId::from("a");
        let b = ActivityId::from("b");
        assert!(gate.should_notify(&a, true));
        clock.advance(Duration::minutes(30));
        assert!(gate.should_notify(&b, true));
        clock.advance(Duration::minutes(31));

        assert_eq!(gate.live_records(clock.now()), 1);
        assert_eq!(gate.prune(clock.now()), 1);
        assert!(matches!(
            gate.state(&b, clock.now()),
            GateState::Suppressed { .. }
        ));
    }

    #[test]
    fn concurrent_callers_fire_exactly_once() {
        let (_clock, gate) = setup();
        let gate = Arc::new(gate);
        let id = ActivityId::from("shared");
        let fired: usize = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let id = id.clone();
                std::thread::spawn(move || gate.should_notify(&id, true))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap() as usize)
            .sum();
        assert_eq!(fired, 1);
    }
}
