//! In-process stand-ins for the host services, used by the test suites and by
//! hosts that want to drive the notifier without a real platform.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use parking_lot::Mutex;

use crate::{
    alarm::{Alarm, AlarmScheduler},
    clock::Clock,
    injector::{CompletionTarget, UnattendedRebootInjector},
    notifications::{Notification, NotificationChannel, NotificationSink},
    power::PowerManager,
    services::ServiceProvider,
};

/// A clock that only moves when told to. Clones share the same reading.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<FixedOffset>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    type Tz = FixedOffset;

    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock()
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifications {
    channels: Mutex<Vec<NotificationChannel>>,
    posted: Mutex<Vec<(u32, Notification)>>,
    visible: Mutex<BTreeMap<u32, Notification>>,
}

impl RecordingNotifications {
    pub fn channels(&self) -> Vec<NotificationChannel> {
        self.channels.lock().clone()
    }

    /// Every `notify` call in order.
    pub fn posted(&self) -> Vec<(u32, Notification)> {
        self.posted.lock().clone()
    }

    /// What a user would currently see, one entry per id.
    pub fn visible(&self) -> BTreeMap<u32, Notification> {
        self.visible.lock().clone()
    }
}

impl NotificationSink for RecordingNotifications {
    fn create_channel(&self, channel: NotificationChannel) {
        self.channels.lock().push(channel);
    }

    fn notify(&self, id: u32, notification: Notification) {
        self.posted.lock().push((id, notification.clone()));
        self.visible.lock().insert(id, notification);
    }
}

/// Keeps every alarm registration instead of only the latest per action.
#[derive(Debug, Default)]
pub struct RecordingAlarms {
    history: Mutex<Vec<Alarm>>,
}

impl RecordingAlarms {
    pub fn history(&self) -> Vec<Alarm> {
        self.history.lock().clone()
    }
}

impl AlarmScheduler for RecordingAlarms {
    fn set_exact(&self, alarm: Alarm) {
        self.history.lock().push(alarm);
    }
}

#[derive(Debug, Default)]
pub struct RecordingPower {
    reasons: Mutex<Vec<String>>,
}

impl RecordingPower {
    pub fn reasons(&self) -> Vec<String> {
        self.reasons.lock().clone()
    }
}

impl PowerManager for RecordingPower {
    fn reboot(&self, reason: &str) {
        self.reasons.lock().push(reason.to_string());
    }
}

/// Service provider whose services can be switched off to mimic early boot.
/// Clones share the switches.
#[derive(Clone)]
pub struct ToggleServices {
    notifications: Arc<dyn NotificationSink>,
    alarms: Arc<dyn AlarmScheduler>,
    power: Arc<dyn PowerManager>,
    notifications_ready: Arc<AtomicBool>,
    alarms_ready: Arc<AtomicBool>,
    power_ready: Arc<AtomicBool>,
}

impl ToggleServices {
    pub fn new(
        notifications: Arc<dyn NotificationSink>,
        alarms: Arc<dyn AlarmScheduler>,
        power: Arc<dyn PowerManager>,
    ) -> Self {
        Self {
            notifications,
            alarms,
            power,
            notifications_ready: Arc::new(AtomicBool::new(true)),
            alarms_ready: Arc::new(AtomicBool::new(true)),
            power_ready: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_notifications_ready(&self, ready: bool) {
        self.notifications_ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_alarms_ready(&self, ready: bool) {
        self.alarms_ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_power_ready(&self, ready: bool) {
        self.power_ready.store(ready, Ordering::SeqCst);
    }
}

impl ServiceProvider for ToggleServices {
    fn notification_sink(&self) -> Option<Arc<dyn NotificationSink>> {
        self.notifications_ready
            .load(Ordering::SeqCst)
            .then(|| self.notifications.clone())
    }

    fn alarm_scheduler(&self) -> Option<Arc<dyn AlarmScheduler>> {
        self.alarms_ready
            .load(Ordering::SeqCst)
            .then(|| self.alarms.clone())
    }

    fn power_manager(&self) -> Option<Arc<dyn PowerManager>> {
        self.power_ready
            .load(Ordering::SeqCst)
            .then(|| self.power.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectorCall {
    SetRebootAlarm(DateTime<Utc>),
    SetPrepareFallbackAlarm(StdDuration),
    CancelPrepareFallbackAlarm,
    TriggerRebootOnNetworkAvailable,
    RebootAndApply { reason: String, slot_switch: bool },
    PrepareForUnattendedUpdate {
        token: String,
        target: Option<CompletionTarget>,
    },
    RegularReboot,
}

/// Scripted recovery-system backend that records every effectful call.
#[derive(Debug)]
pub struct FakeRebootInjector {
    pub now: DateTime<Utc>,
    pub zone: FixedOffset,
    pub uptime: StdDuration,
    pub start_hour: u32,
    pub end_hour: u32,
    pub frequency_days: u32,
    pub requires_charging: bool,
    pub fail_recovery_calls: bool,
    prepared: AtomicBool,
    calls: Mutex<Vec<InjectorCall>>,
}

impl FakeRebootInjector {
    pub fn new(now: DateTime<Utc>, zone: FixedOffset) -> Self {
        Self {
            now,
            zone,
            uptime: StdDuration::ZERO,
            start_hour: 3,
            end_hour: 5,
            frequency_days: 2,
            requires_charging: false,
            fail_recovery_calls: false,
            prepared: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<InjectorCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: InjectorCall) {
        self.calls.lock().push(call);
    }

    fn recovery_result(&self) -> io::Result<()> {
        if self.fail_recovery_calls {
            return Err(io::Error::new(io::ErrorKind::Other, "recovery system unavailable"));
        }
        Ok(())
    }
}

impl UnattendedRebootInjector for FakeRebootInjector {
    type Tz = FixedOffset;

    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn time_zone(&self) -> FixedOffset {
        self.zone
    }

    fn elapsed_realtime(&self) -> StdDuration {
        self.uptime
    }

    fn reboot_start_hour(&self) -> u32 {
        self.start_hour
    }

    fn reboot_end_hour(&self) -> u32 {
        self.end_hour
    }

    fn reboot_frequency_days(&self) -> u32 {
        self.frequency_days
    }

    fn set_reboot_alarm(&self, at: DateTime<Utc>) {
        self.record(InjectorCall::SetRebootAlarm(at));
    }

    fn set_prepare_fallback_alarm(&self, delay: StdDuration) {
        self.record(InjectorCall::SetPrepareFallbackAlarm(delay));
    }

    fn cancel_prepare_fallback_alarm(&self) {
        self.record(InjectorCall::CancelPrepareFallbackAlarm);
    }

    fn trigger_reboot_on_network_available(&self) {
        self.record(InjectorCall::TriggerRebootOnNetworkAvailable);
    }

    fn reboot_and_apply(&self, reason: &str, slot_switch: bool) -> io::Result<i32> {
        self.record(InjectorCall::RebootAndApply {
            reason: reason.to_string(),
            slot_switch,
        });
        self.recovery_result().map(|()| 0)
    }

    fn prepare_for_unattended_update(
        &self,
        token: &str,
        target: Option<&CompletionTarget>,
    ) -> io::Result<()> {
        self.record(InjectorCall::PrepareForUnattendedUpdate {
            token: token.to_string(),
            target: target.cloned(),
        });
        self.recovery_result()?;
        self.prepared.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_prepared_for_unattended_update(&self) -> io::Result<bool> {
        self.recovery_result()?;
        Ok(self.prepared.load(Ordering::SeqCst))
    }

    fn requires_charging_for_reboot(&self) -> bool {
        self.requires_charging
    }

    fn regular_reboot(&self) {
        self.record(InjectorCall::RegularReboot);
    }
}
