//! Every effectful operation the unattended reboot manager performs, gathered
//! behind one trait so its decision logic can run against a fake backend.

use std::io;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Opaque handle the recovery system notifies once an unattended update has
/// been prepared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionTarget(pub String);

pub trait UnattendedRebootInjector: Send + Sync {
    type Tz: TimeZone;

    fn now(&self) -> DateTime<Utc>;
    fn time_zone(&self) -> Self::Tz;
    /// Monotonic time since boot, including deep sleep.
    fn elapsed_realtime(&self) -> Duration;

    fn reboot_start_hour(&self) -> u32;
    fn reboot_end_hour(&self) -> u32;
    fn reboot_frequency_days(&self) -> u32;

    fn set_reboot_alarm(&self, at: DateTime<Utc>);
    fn set_prepare_fallback_alarm(&self, delay: Duration);
    fn cancel_prepare_fallback_alarm(&self);

    fn trigger_reboot_on_network_available(&self);

    /// Reboots into the prepared update. `slot_switch` selects the other A/B slot.
    fn reboot_and_apply(&self, reason: &str, slot_switch: bool) -> io::Result<i32>;
    fn prepare_for_unattended_update(
        &self,
        token: &str,
        target: Option<&CompletionTarget>,
    ) -> io::Result<()>;
    fn is_prepared_for_unattended_update(&self) -> io::Result<bool>;
    fn requires_charging_for_reboot(&self) -> bool;

    fn regular_reboot(&self);
}
