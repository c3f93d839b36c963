use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two private messages the notifier sends itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    PostNotification,
    TriggerHardReboot,
}

impl Action {
    pub const POST_NOTIFICATION: &'static str = "flagstage.POST_NOTIFICATION";
    pub const TRIGGER_HARD_REBOOT: &'static str = "flagstage.TRIGGER_HARD_REBOOT";

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::PostNotification => Self::POST_NOTIFICATION,
            Action::TriggerHardReboot => Self::TRIGGER_HARD_REBOOT,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action `{0}`")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::POST_NOTIFICATION => Ok(Action::PostNotification),
            Self::TRIGGER_HARD_REBOOT => Ok(Action::TriggerHardReboot),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmKind {
    /// Wall-clock time, exact, wakes the device.
    RtcWakeup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub kind: AlarmKind,
    pub fire_at: DateTime<Utc>,
    pub action: Action,
}

impl Alarm {
    pub fn exact_wakeup(fire_at: DateTime<Utc>, action: Action) -> Self {
        Self {
            kind: AlarmKind::RtcWakeup,
            fire_at,
            action,
        }
    }
}

/// Platform alarm service. Setting an alarm replaces any pending alarm for the
/// same action.
pub trait AlarmScheduler: Send + Sync {
    fn set_exact(&self, alarm: Alarm);
}

/// In-process timer table keyed by action.
#[derive(Debug, Default)]
pub struct AlarmTable {
    pending: Mutex<BTreeMap<Action, Alarm>>,
}

impl AlarmTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self, action: Action) -> Option<Alarm> {
        self.pending.lock().get(&action).copied()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Earliest pending alarm, if any.
    pub fn next_alarm(&self) -> Option<Alarm> {
        self.pending
            .lock()
            .values()
            .min_by_key(|alarm| alarm.fire_at)
            .copied()
    }

    /// Removes every alarm due at `now` and returns them in firing order.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<Alarm> {
        let mut pending = self.pending.lock();
        let due_actions: Vec<Action> = pending
            .values()
            .filter(|alarm| alarm.fire_at <= now)
            .map(|alarm| alarm.action)
            .collect();
        let mut due: Vec<Alarm> = due_actions
            .into_iter()
            .filter_map(|action| pending.remove(&action))
            .collect();
        due.sort_by_key(|alarm| alarm.fire_at);
        due
    }
}

impl AlarmScheduler for AlarmTable {
    fn set_exact(&self, alarm: Alarm) {
        let previous = self.pending.lock().insert(alarm.action, alarm);
        match previous {
            Some(old) => tracing::debug!(
                action = %alarm.action,
                from = %old.fire_at,
                to = %alarm.fire_at,
                "replaced pending alarm"
            ),
            None => tracing::debug!(action = %alarm.action, fire_at = %alarm.fire_at, "alarm set"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap()
    }

    #[test]
    fn action_strings_round_trip() {
        for action in [Action::PostNotification, Action::TriggerHardReboot] {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert_eq!(
            "flagstage.SOMETHING_ELSE".parse::<Action>(),
            Err(UnknownAction("flagstage.SOMETHING_ELSE".into()))
        );
    }

    #[test]
    fn setting_same_action_overwrites() {
        let table = AlarmTable::new();
        table.set_exact(Alarm::exact_wakeup(t0(), Action::PostNotification));
        table.set_exact(Alarm::exact_wakeup(
            t0() + Duration::days(1),
            Action::PostNotification,
        ));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.pending(Action::PostNotification).unwrap().fire_at,
            t0() + Duration::days(1)
        );
    }

    #[test]
    fn take_due_drains_in_fire_order() {
        let table = AlarmTable::new();
        table.set_exact(Alarm::exact_wakeup(
            t0() + Duration::minutes(5),
            Action::PostNotification,
        ));
        table.set_exact(Alarm::exact_wakeup(t0(), Action::TriggerHardReboot));

        assert!(table.take_due(t0() - Duration::seconds(1)).is_empty());
        assert_eq!(table.next_alarm().unwrap().action, Action::TriggerHardReboot);

        let due = table.take_due(t0() + Duration::hours(1));
        let order: Vec<Action> = due.iter().map(|alarm| alarm.action).collect();
        assert_eq!(order, vec![Action::TriggerHardReboot, Action::PostNotification]);
        assert!(table.is_empty());
    }
}
