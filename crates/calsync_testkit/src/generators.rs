//! Property-based test generators using proptest.
//!
//! Provides strategies for generating calendar events and event sets
//! that keep ids unique within a set.

use crate::fixtures::minutes_after_base;
use calsync_protocol::CalendarEvent;
use chrono::Duration;
use proptest::prelude::*;

/// Strategy for generating a single event.
pub fn event_strategy() -> impl Strategy<Value = CalendarEvent> {
    (
        "[a-z][a-z0-9]{0,11}",
        "[A-Za-z][A-Za-z ]{0,23}",
        0i64..(14 * 24 * 60),
        15i64..240,
        -10_000i64..10_000,
        proptest::option::of("[a-z ]{0,32}"),
    )
        .prop_map(|(id, title, start, length, modified, description)| {
            let start_at = minutes_after_base(start);
            let mut event = CalendarEvent::new(
                id,
                title,
                start_at,
                start_at + Duration::minutes(length),
                minutes_after_base(modified),
            );
            event.description = description;
            event
        })
}

/// Strategy for generating an event set with unique ids.
pub fn event_set_strategy(max_len: usize) -> impl Strategy<Value = Vec<CalendarEvent>> {
    prop::collection::vec(event_strategy(), 0..=max_len).prop_map(|mut events| {
        events.sort_by(|a, b| a.id.cmp(&b.id));
        events.dedup_by(|a, b| a.id == b.id);
        events
    })
}
