use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, TimeZone, Utc};
use flagstage_core::{
    alarm::{Action, AlarmTable},
    fakes::{FixedClock, RecordingNotifications, RecordingPower, ToggleServices},
    flags::{Properties, StagedFlagSet},
    power::REBOOT_REASON,
    BootNotifier,
};
use tempfile::tempdir;

fn write_file(path: &PathBuf, contents: &str) {
    fs::write(path, contents).expect("write fixture");
}

#[test]
fn staged_flag_to_reboot_round_trip() {
    let temp = tempdir().expect("tempdir");
    let flags_file = temp.path().join("staged_flags.json");
    write_file(&flags_file, r#"{"sys": ["feature_x"]}"#);
    let staged = StagedFlagSet::load(&flags_file).expect("load staged flags");

    let zone = FixedOffset::east_opt(0).unwrap();
    let boot = zone.with_ymd_and_hms(2025, 6, 2, 7, 0, 0).unwrap();
    let clock = FixedClock::new(boot);
    let notifications = Arc::new(RecordingNotifications::default());
    let alarms = Arc::new(AlarmTable::new());
    let power = Arc::new(RecordingPower::default());

    let notifier = BootNotifier::builder()
        .with_clock(clock.clone())
        .with_staged_flags(staged)
        .with_services(Box::new(ToggleServices::new(
            notifications.clone(),
            alarms.clone(),
            power.clone(),
        )))
        .build()
        .expect("build notifier");

    let batch = Properties::new("staged")
        .with("sys*feature_x", "true")
        .with("bogus_key", "1");
    notifier.on_properties_changed(&batch);

    let pending = alarms
        .pending(Action::PostNotification)
        .expect("reminder scheduled");
    assert_eq!(pending.fire_at, Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap());
    assert!(notifications.posted().is_empty());

    // A second matching batch only moves the pending reminder.
    notifier.on_properties_changed(&batch);
    assert_eq!(alarms.len(), 1);

    // 90000s of uptime by the time the alarm goes off.
    clock.set(boot + Duration::seconds(90_000));
    assert_eq!(notifier.fire_due(&alarms), 1);

    let visible = notifications.visible();
    assert_eq!(visible.len(), 1);
    let notification = visible.get(&111_555).expect("reminder visible");
    let action = &notification.actions[0];
    assert_eq!(action.target, Action::TriggerHardReboot);
    assert!(alarms.is_empty());

    notifier.dispatch(action.target);
    assert_eq!(power.reasons(), vec![REBOOT_REASON.to_string()]);
    assert_eq!(REBOOT_REASON, "DeviceConfig");
}

#[test]
fn reminder_keeps_deferring_while_uptime_is_short() {
    let zone = FixedOffset::west_opt(7 * 3600).unwrap();
    let start = zone.with_ymd_and_hms(2025, 6, 2, 11, 0, 0).unwrap();
    let clock = FixedClock::new(start);
    let notifications = Arc::new(RecordingNotifications::default());
    let alarms = Arc::new(AlarmTable::new());

    // A boot time ahead of the clock keeps the uptime guard failing.
    let notifier = BootNotifier::builder()
        .with_clock(clock.clone())
        .with_staged_flags([("sys", "feature_x")].into_iter().collect())
        .with_services(Box::new(ToggleServices::new(
            notifications.clone(),
            alarms.clone(),
            Arc::new(RecordingPower::default()),
        )))
        .with_last_reboot(start.with_timezone(&Utc) + Duration::days(30))
        .build()
        .expect("build notifier");

    notifier.on_properties_changed(&Properties::new("staged").with("sys*feature_x", "1"));
    let first = alarms.pending(Action::PostNotification).unwrap();
    assert_eq!(
        first.fire_at,
        zone.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap().with_timezone(&Utc)
    );

    let mut expected = first.fire_at;
    for _ in 0..3 {
        clock.advance(Duration::days(1));
        assert_eq!(notifier.fire_due(&alarms), 1);
        expected += Duration::days(1);
        assert_eq!(alarms.pending(Action::PostNotification).unwrap().fire_at, expected);
    }
    assert!(notifications.posted().is_empty());
}
