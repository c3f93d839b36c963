use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::{
    alarm::AlarmScheduler,
    notifications::{NotificationChannel, NotificationSink},
    power::PowerManager,
};

/// Host service locator. Any service may be missing early in boot.
pub trait ServiceProvider: Send + Sync {
    fn notification_sink(&self) -> Option<Arc<dyn NotificationSink>>;
    fn alarm_scheduler(&self) -> Option<Arc<dyn AlarmScheduler>>;
    fn power_manager(&self) -> Option<Arc<dyn PowerManager>>;
}

/// Provider for services that are handed over up front.
#[derive(Clone)]
pub struct StaticServices {
    pub notifications: Arc<dyn NotificationSink>,
    pub alarms: Arc<dyn AlarmScheduler>,
    pub power: Arc<dyn PowerManager>,
}

impl ServiceProvider for StaticServices {
    fn notification_sink(&self) -> Option<Arc<dyn NotificationSink>> {
        Some(self.notifications.clone())
    }

    fn alarm_scheduler(&self) -> Option<Arc<dyn AlarmScheduler>> {
        Some(self.alarms.clone())
    }

    fn power_manager(&self) -> Option<Arc<dyn PowerManager>> {
        Some(self.power.clone())
    }
}

/// All three handles, once every one of them is available.
#[derive(Clone)]
pub struct Acquired {
    pub notifications: Arc<dyn NotificationSink>,
    pub alarms: Arc<dyn AlarmScheduler>,
    pub power: Arc<dyn PowerManager>,
}

/// Caches service handles as they become available. Each handle is stored at
/// most once; the notification channel is registered when the sink is first
/// stored.
pub struct PlatformServices {
    provider: Box<dyn ServiceProvider>,
    channel: NotificationChannel,
    notifications: OnceCell<Arc<dyn NotificationSink>>,
    alarms: OnceCell<Arc<dyn AlarmScheduler>>,
    power: OnceCell<Arc<dyn PowerManager>>,
}

impl PlatformServices {
    pub fn new(provider: Box<dyn ServiceProvider>, channel: NotificationChannel) -> Self {
        Self {
            provider,
            channel,
            notifications: OnceCell::new(),
            alarms: OnceCell::new(),
            power: OnceCell::new(),
        }
    }

    pub fn notification_sink(&self) -> Option<Arc<dyn NotificationSink>> {
        if let Some(sink) = self.notifications.get() {
            return Some(sink.clone());
        }
        let sink = self.provider.notification_sink()?;
        let mut stored_here = false;
        let sink = self.notifications.get_or_init(|| {
            stored_here = true;
            sink
        });
        if stored_here {
            tracing::debug!(channel = %self.channel.id, "creating notification channel");
            sink.create_channel(self.channel.clone());
        }
        Some(sink.clone())
    }

    pub fn alarm_scheduler(&self) -> Option<Arc<dyn AlarmScheduler>> {
        if let Some(alarms) = self.alarms.get() {
            return Some(alarms.clone());
        }
        let alarms = self.provider.alarm_scheduler()?;
        Some(self.alarms.get_or_init(|| alarms).clone())
    }

    pub fn power_manager(&self) -> Option<Arc<dyn PowerManager>> {
        if let Some(power) = self.power.get() {
            return Some(power.clone());
        }
        let power = self.provider.power_manager()?;
        Some(self.power.get_or_init(|| power).clone())
    }

    /// Tries every handle, so partial progress is kept even when one is still
    /// missing.
    pub fn acquire(&self) -> Option<Acquired> {
        let notifications = self.notification_sink();
        let alarms = self.alarm_scheduler();
        let power = self.power_manager();
        Some(Acquired {
            notifications: notifications?,
            alarms: alarms?,
            power: power?,
        })
    }
}
