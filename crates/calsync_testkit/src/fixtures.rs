//! Calendar event fixtures.
//!
//! All fixtures hang off a fixed base instant so hashes and timestamps are
//! reproducible across runs.

use calsync_protocol::CalendarEvent;
use chrono::{DateTime, Duration, TimeZone, Utc};

/// The fixed instant every fixture is relative to (2024-01-15 09:00 UTC).
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Returns `base_time()` shifted by `minutes`.
pub fn minutes_after_base(minutes: i64) -> DateTime<Utc> {
    base_time() + Duration::minutes(minutes)
}

/// A one-hour event starting at the base time, last modified at the base time.
pub fn event(id: &str, title: &str) -> CalendarEvent {
    event_at(id, title, 0, 0)
}

/// A one-hour event starting `start_min` after base, modified `modified_min` after base.
pub fn event_at(id: &str, title: &str, start_min: i64, modified_min: i64) -> CalendarEvent {
    let start = minutes_after_base(start_min);
    CalendarEvent::new(
        id,
        title,
        start,
        start + Duration::hours(1),
        minutes_after_base(modified_min),
    )
}

/// A small working day of events, in chronological order.
pub fn sample_day() -> Vec<CalendarEvent> {
    vec![
        event_at("standup", "Daily standup", 0, 0).with_calendar_id("work"),
        event_at("review", "Design review", 120, 0)
            .with_location("Room 2")
            .with_calendar_id("work"),
        event_at("gym", "Gym", 540, 0).with_calendar_id("personal"),
    ]
}
