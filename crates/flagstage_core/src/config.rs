use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    notifications::{Importance, NotificationChannel},
    power::REBOOT_REASON,
    resources::ResourceLookup,
};

pub const REBOOT_HOUR: u32 = 10;
pub const REBOOT_MINUTE: u32 = 0;
pub const MIN_SECONDS_TO_SHOW_NOTIF: i64 = 86_400;
pub const NOTIFICATION_ID: u32 = 111_555;
pub const CHANNEL_ID: &str = "trunk-stable-flags";
pub const CHANNEL_NAME: &str = "Trunkfood flags";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid post time {hour:02}:{minute:02}")]
    InvalidPostTime { hour: u32, minute: u32 },
    #[error("minimum uptime must not be negative, got {0}s")]
    NegativeMinUptime(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub reboot_hour: u32,
    pub reboot_minute: u32,
    pub min_seconds_before_notify: i64,
    pub notification_id: u32,
    pub channel_id: String,
    pub channel_name: String,
    pub reboot_reason: String,
    pub resources: ResourceLookup,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            reboot_hour: REBOOT_HOUR,
            reboot_minute: REBOOT_MINUTE,
            min_seconds_before_notify: MIN_SECONDS_TO_SHOW_NOTIF,
            notification_id: NOTIFICATION_ID,
            channel_id: CHANNEL_ID.to_string(),
            channel_name: CHANNEL_NAME.to_string(),
            reboot_reason: REBOOT_REASON.to_string(),
            resources: ResourceLookup::default(),
        }
    }
}

impl NotifierConfig {
    pub fn post_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::from_hms_opt(self.reboot_hour, self.reboot_minute, 0).ok_or(
            ConfigError::InvalidPostTime {
                hour: self.reboot_hour,
                minute: self.reboot_minute,
            },
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.post_time()?;
        if self.min_seconds_before_notify < 0 {
            return Err(ConfigError::NegativeMinUptime(
                self.min_seconds_before_notify,
            ));
        }
        Ok(())
    }

    pub fn channel(&self) -> NotificationChannel {
        NotificationChannel {
            id: self.channel_id.clone(),
            name: self.channel_name.clone(),
            importance: Importance::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reminder_policy() {
        let config = NotifierConfig::default();
        assert_eq!(config.post_time().unwrap(), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(config.notification_id, 111_555);
        assert_eq!(config.min_seconds_before_notify, 86_400);
        assert_eq!(config.reboot_reason, "DeviceConfig");
        assert_eq!(config.channel().importance, Importance::High);
    }

    #[test]
    fn rejects_out_of_range_post_time() {
        let config = NotifierConfig {
            reboot_hour: 24,
            ..NotifierConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidPostTime {
                hour: 24,
                minute: 0
            })
        );
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: NotifierConfig =
            serde_json::from_str(r#"{"reboot_hour": 7, "resources": "discover"}"#).unwrap();
        assert_eq!(config.reboot_hour, 7);
        assert_eq!(config.reboot_minute, 0);
        assert_eq!(config.resources, ResourceLookup::Discover);
        assert_eq!(config.channel_id, CHANNEL_ID);
    }
}
