use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use flagstage_core::{
    alarm::AlarmTable,
    config::NotifierConfig,
    flags::{Properties, StagedFlagSet},
    notifications::{Notification, NotificationChannel, NotificationSink},
    power::PowerManager,
    resources::ResourceLookup,
    services::StaticServices,
    BootNotifier,
};
use tracing::{info, warn};

#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub(crate) flags_file: Option<PathBuf>,
    pub(crate) notifier: NotifierConfig,
    pub(crate) allow_reboot: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("FLAGSTAGE_FLAGS_FILE") {
            config.flags_file = Some(PathBuf::from(path));
        }
        if let Ok(hour) = std::env::var("FLAGSTAGE_REBOOT_HOUR") {
            config.notifier.reboot_hour = hour
                .trim()
                .parse()
                .with_context(|| format!("FLAGSTAGE_REBOOT_HOUR=`{hour}`"))?;
        }
        if let Ok(minute) = std::env::var("FLAGSTAGE_REBOOT_MINUTE") {
            config.notifier.reboot_minute = minute
                .trim()
                .parse()
                .with_context(|| format!("FLAGSTAGE_REBOOT_MINUTE=`{minute}`"))?;
        }
        if let Ok(secs) = std::env::var("FLAGSTAGE_MIN_UPTIME_SECS") {
            config.notifier.min_seconds_before_notify = secs
                .trim()
                .parse()
                .with_context(|| format!("FLAGSTAGE_MIN_UPTIME_SECS=`{secs}`"))?;
        }
        config.notifier.resources = match std::env::var("FLAGSTAGE_RESOURCES_PACKAGE") {
            Ok(package) if !package.trim().is_empty() => {
                ResourceLookup::Fixed(package.trim().to_string())
            }
            _ => ResourceLookup::Discover,
        };
        config.allow_reboot = std::env::var("FLAGSTAGE_ALLOW_REBOOT")
            .map(|value| value.trim() == "1")
            .unwrap_or(false);
        config.notifier.validate()?;
        Ok(config)
    }

    fn staged_flags(&self) -> Result<StagedFlagSet> {
        match &self.flags_file {
            Some(path) => StagedFlagSet::load(path),
            None => {
                warn!("FLAGSTAGE_FLAGS_FILE not set; no change will match");
                Ok(StagedFlagSet::new())
            }
        }
    }
}

/// Prints reminders to the log instead of a notification shade.
struct LogNotifications;

impl NotificationSink for LogNotifications {
    fn create_channel(&self, channel: NotificationChannel) {
        info!(id = %channel.id, name = %channel.name, importance = ?channel.importance, "notification channel ready");
    }

    fn notify(&self, id: u32, notification: Notification) {
        let actions: Vec<&str> = notification
            .actions
            .iter()
            .map(|action| action.label.as_str())
            .collect();
        info!(
            id,
            title = %notification.title,
            body = %notification.body,
            ?actions,
            "reminder posted"
        );
    }
}

struct ShutdownPower {
    allow_reboot: bool,
}

impl PowerManager for ShutdownPower {
    fn reboot(&self, reason: &str) {
        if !self.allow_reboot {
            info!(reason, "dry run, not rebooting");
            return;
        }
        match Command::new("shutdown").arg("-r").arg("now").status() {
            Ok(status) if status.success() => info!(reason, "reboot requested"),
            Ok(status) => warn!(reason, %status, "reboot command failed"),
            Err(err) => warn!(reason, %err, "unable to run reboot command"),
        }
    }
}

fn parse_batch(line: &str) -> Result<Properties> {
    let values: BTreeMap<String, String> =
        serde_json::from_str(line).context("expected a JSON object of string values")?;
    Ok(Properties::staged(values))
}

pub fn run(config: AppConfig) -> Result<()> {
    let staged = config.staged_flags()?;
    info!(flags = staged.len(), "loaded staged flag set");

    let alarms = Arc::new(AlarmTable::new());
    let services = StaticServices {
        notifications: Arc::new(LogNotifications),
        alarms: alarms.clone(),
        power: Arc::new(ShutdownPower {
            allow_reboot: config.allow_reboot,
        }),
    };
    let notifier = BootNotifier::builder()
        .with_config(config.notifier)
        .with_staged_flags(staged)
        .with_services(Box::new(services))
        .build()?;

    let stdin = std::io::stdin();
    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line.context("reading property batches from stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_batch(&line) {
            Ok(batch) => notifier.on_properties_changed(&batch),
            Err(err) => warn!(line = index + 1, %err, "skipping property batch"),
        }
    }

    while let Some(next) = alarms.next_alarm() {
        let wait = next.fire_at - Utc::now();
        if let Ok(wait) = wait.to_std() {
            info!(action = %next.action, fire_at = %next.fire_at, "waiting for alarm");
            std::thread::sleep(wait);
        }
        notifier.fire_due(&alarms);
    }
    info!("no pending alarms, exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_lines() {
        let batch = parse_batch(r#"{"sys*feature_x": "true", "bogus_key": "1"}"#).unwrap();
        assert_eq!(batch.namespace, "staged");
        assert_eq!(batch.keys().count(), 2);
        assert!(parse_batch(r#"["sys*feature_x"]"#).is_err());
        assert!(parse_batch(r#"{"sys*feature_x": true}"#).is_err());
    }

    #[test]
    fn dry_run_power_never_shells_out() {
        let power = ShutdownPower {
            allow_reboot: false,
        };
        power.reboot("DeviceConfig");
    }

    #[test]
    fn missing_flags_file_yields_empty_set() {
        let config = AppConfig::default();
        assert!(config.staged_flags().unwrap().is_empty());
    }
}
