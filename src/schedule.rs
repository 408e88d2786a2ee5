//! Time-of-day matching for the alarm poll loop.

use chrono::{DateTime, Datelike, TimeZone, Timelike};

use crate::models::Alarm;

/// Decide whether `alarm` is due at `now`.
///
/// The stored instant is converted into `now`'s timezone and compared by
/// hour and minute only, giving a match window of exactly one minute against
/// the one-minute poll cadence. Minutes missed while the process was
/// suspended are not caught up. Repeating alarms additionally require the
/// current weekday to be selected.
pub fn should_fire<Tz: TimeZone>(alarm: &Alarm, now: &DateTime<Tz>) -> bool {
    if !alarm.enabled {
        return false;
    }

    let scheduled = alarm.scheduled_at.with_timezone(&now.timezone());
    if scheduled.hour() != now.hour() || scheduled.minute() != now.minute() {
        return false;
    }

    alarm.is_one_time() || alarm.repeat_days.contains(now.weekday())
}
