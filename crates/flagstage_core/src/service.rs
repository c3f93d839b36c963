use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveTime, Utc};
use parking_lot::Mutex;

use crate::{
    alarm::{Action, Alarm, AlarmScheduler, AlarmTable},
    clock::{Clock, SystemClock},
    config::NotifierConfig,
    flags::{Properties, StagedFlagSet},
    notifications::{Notification, NotificationAction},
    resources::{ResourceBundle, ResourceLookup, ResourceResolver, StaticResources},
    schedule::{self, ScheduleState},
    services::{PlatformServices, ServiceProvider},
};

/// Watches staged flag changes and reminds the user to reboot once the
/// configured hour comes round.
pub struct BootNotifier<C: Clock = SystemClock> {
    config: NotifierConfig,
    post_time: NaiveTime,
    staged: StagedFlagSet,
    clock: C,
    services: PlatformServices,
    resources: Arc<dyn ResourceResolver>,
    state: Mutex<ScheduleState>,
}

pub struct BootNotifierBuilder<C: Clock = SystemClock> {
    config: NotifierConfig,
    staged: StagedFlagSet,
    clock: C,
    provider: Option<Box<dyn ServiceProvider>>,
    resources: Option<Arc<dyn ResourceResolver>>,
    last_reboot: Option<DateTime<Utc>>,
}

impl BootNotifierBuilder<SystemClock> {
    pub fn new() -> Self {
        Self {
            config: NotifierConfig::default(),
            staged: StagedFlagSet::new(),
            clock: SystemClock,
            provider: None,
            resources: None,
            last_reboot: None,
        }
    }
}

impl Default for BootNotifierBuilder<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> BootNotifierBuilder<C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> BootNotifierBuilder<C2> {
        BootNotifierBuilder {
            config: self.config,
            staged: self.staged,
            clock,
            provider: self.provider,
            resources: self.resources,
            last_reboot: self.last_reboot,
        }
    }

    pub fn with_config(mut self, config: NotifierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_staged_flags(mut self, staged: StagedFlagSet) -> Self {
        self.staged = staged;
        self
    }

    pub fn with_services(mut self, provider: Box<dyn ServiceProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_resources(mut self, resources: Arc<dyn ResourceResolver>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Defaults to the clock reading at build time.
    pub fn with_last_reboot(mut self, last_reboot: DateTime<Utc>) -> Self {
        self.last_reboot = Some(last_reboot);
        self
    }

    pub fn build(self) -> Result<BootNotifier<C>> {
        self.config.validate()?;
        let post_time = self.config.post_time()?;
        let provider = self
            .provider
            .ok_or_else(|| anyhow!("boot notifier needs a service provider"))?;
        let last_reboot = self
            .last_reboot
            .unwrap_or_else(|| self.clock.now().with_timezone(&Utc));
        let resources = self
            .resources
            .unwrap_or_else(|| Arc::new(StaticResources::builtin()));
        let services = PlatformServices::new(provider, self.config.channel());
        Ok(BootNotifier {
            config: self.config,
            post_time,
            staged: self.staged,
            clock: self.clock,
            services,
            resources,
            state: Mutex::new(ScheduleState::new(last_reboot)),
        })
    }
}

impl BootNotifier<SystemClock> {
    pub fn builder() -> BootNotifierBuilder<SystemClock> {
        BootNotifierBuilder::new()
    }
}

impl<C: Clock> BootNotifier<C> {
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn staged_flags(&self) -> &StagedFlagSet {
        &self.staged
    }

    pub fn schedule_state(&self) -> ScheduleState {
        *self.state.lock()
    }

    /// Schedules the reminder when the batch touches a staged flag. Nothing is
    /// posted here.
    #[tracing::instrument(skip_all, fields(namespace = %properties.namespace))]
    pub fn on_properties_changed(&self, properties: &Properties) {
        if !self.staged.contains_staged_changes(properties.keys()) {
            return;
        }
        let Some(services) = self.services.acquire() else {
            tracing::info!("not posting notification; service dependencies not ready");
            return;
        };
        let fire_at = schedule::next_post_time(&self.clock.now(), self.post_time);
        self.schedule_post(services.alarms.as_ref(), fire_at.with_timezone(&Utc));
    }

    /// Runs when the post alarm fires.
    pub fn on_post_notification(&self) {
        let Some(services) = self.services.acquire() else {
            tracing::warn!("post alarm fired before service dependencies were ready");
            return;
        };

        let now = self.clock.now();
        let elapsed = self
            .state
            .lock()
            .seconds_since_reboot(now.with_timezone(&Utc));
        if elapsed < self.config.min_seconds_before_notify {
            tracing::warn!(elapsed, "not enough time passed since reboot, punting");
            let retry_at = schedule::retry_post_time(&now, self.post_time);
            self.schedule_post(services.alarms.as_ref(), retry_at.with_timezone(&Utc));
            return;
        }

        let Some(package) = self.resources_package() else {
            tracing::warn!("unable to find resources package");
            return;
        };
        let bundle = match self.resources.load(&package) {
            Ok(bundle) => bundle,
            Err(err) => {
                tracing::error!(%package, error = %err, "failed to post boot notification");
                return;
            }
        };

        let notification = self.build_notification(bundle);
        services
            .notifications
            .notify(self.config.notification_id, notification);
        self.state.lock().next_fire = None;
        tracing::info!(id = self.config.notification_id, "posted staged flag reminder");
    }

    /// Runs when the user taps the reminder's restart action.
    pub fn on_trigger_hard_reboot(&self) {
        match self.services.power_manager() {
            Some(power) => {
                tracing::info!(reason = %self.config.reboot_reason, "rebooting to apply staged flags");
                power.reboot(&self.config.reboot_reason);
            }
            None => tracing::warn!("power service unavailable, ignoring reboot request"),
        }
    }

    pub fn dispatch(&self, action: Action) {
        match action {
            Action::PostNotification => self.on_post_notification(),
            Action::TriggerHardReboot => self.on_trigger_hard_reboot(),
        }
    }

    /// Dispatches a message by its action string. Unknown messages are dropped.
    pub fn dispatch_named(&self, action: &str) {
        match action.parse::<Action>() {
            Ok(action) => self.dispatch(action),
            Err(err) => tracing::warn!(%err, "ignoring message"),
        }
    }

    /// Fires every alarm in `table` that is due by the clock, in order.
    pub fn fire_due(&self, table: &AlarmTable) -> usize {
        let due = table.take_due(self.clock.now().with_timezone(&Utc));
        for alarm in &due {
            tracing::debug!(action = %alarm.action, fire_at = %alarm.fire_at, "alarm fired");
            self.dispatch(alarm.action);
        }
        due.len()
    }
}

impl<C: Clock> BootNotifier<C> {
    fn schedule_post(&self, alarms: &dyn AlarmScheduler, fire_at: DateTime<Utc>) {
        self.state.lock().next_fire = Some(fire_at);
        alarms.set_exact(Alarm::exact_wakeup(fire_at, Action::PostNotification));
        tracing::info!(%fire_at, "scheduled staged flag reminder");
    }

    fn resources_package(&self) -> Option<String> {
        match &self.config.resources {
            ResourceLookup::Fixed(package) => Some(package.clone()),
            ResourceLookup::Discover => self.resources.resources_package_name(),
        }
    }

    fn build_notification(&self, bundle: ResourceBundle) -> Notification {
        Notification {
            channel_id: self.config.channel_id.clone(),
            title: bundle.title,
            body: bundle.content,
            small_icon: bundle.flag_icon,
            actions: vec![NotificationAction {
                icon: bundle.restart_icon,
                label: bundle.action_text,
                target: Action::TriggerHardReboot,
            }],
        }
    }
}
