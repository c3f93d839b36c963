/// Reason recorded by the platform when the reminder's action reboots the device.
pub const REBOOT_REASON: &str = "DeviceConfig";

pub trait PowerManager: Send + Sync {
    fn reboot(&self, reason: &str);
}
