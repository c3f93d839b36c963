use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Next occurrence of `at` strictly after the current wall time: today if the
/// clock still reads earlier than `at`, otherwise tomorrow.
pub fn next_post_time<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let today = now.date_naive().and_time(at);
    let target = if now.naive_local() < today {
        today
    } else {
        today + Duration::days(1)
    };
    resolve_local(&now.timezone(), target)
}

/// The configured time on the day after `now`, used when the reminder is
/// deferred.
pub fn retry_post_time<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tomorrow = now.date_naive().and_time(at) + Duration::days(1);
    resolve_local(&now.timezone(), tomorrow)
}

/// Maps a wall time onto an instant. Ambiguous times take the earlier
/// instant; times inside a gap are pushed forward by an hour.
pub fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(a, b) => earlier(a, b),
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(a, b) => earlier(a, b),
            LocalResult::None => tz.from_utc_datetime(&naive),
        },
    }
}

// Time zones do not agree on which candidate comes first.
fn earlier<Tz: TimeZone>(a: DateTime<Tz>, b: DateTime<Tz>) -> DateTime<Tz> {
    if a <= b {
        a
    } else {
        b
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub last_reboot: DateTime<Utc>,
    pub next_fire: Option<DateTime<Utc>>,
}

impl ScheduleState {
    pub fn new(last_reboot: DateTime<Utc>) -> Self {
        Self {
            last_reboot,
            next_fire: None,
        }
    }

    pub fn seconds_since_reboot(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_reboot).num_seconds()
    }
}
