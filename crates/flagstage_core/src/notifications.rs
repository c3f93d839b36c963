use serde::{Deserialize, Serialize};

use crate::alarm::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Importance {
    Low,
    Default,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub importance: Importance,
}

/// Reference to a drawable inside a resources package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconRef {
    pub package: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub icon: IconRef,
    pub label: String,
    pub target: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub channel_id: String,
    pub title: String,
    pub body: String,
    pub small_icon: IconRef,
    pub actions: Vec<NotificationAction>,
}

/// Platform-specific notification adapters will implement this trait.
pub trait NotificationSink: Send + Sync {
    fn create_channel(&self, channel: NotificationChannel);
    /// Posting with an id that is already showing replaces that notification.
    fn notify(&self, id: u32, notification: Notification);
}
