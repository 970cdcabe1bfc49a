//! Calendar event record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single calendar event as seen by the sync engine.
///
/// `id`, `title`, `start`, `end` and `last_modified` are always present and
/// are the fields covered by [`crate::ContentHash`]. The optional fields are
/// carried through sync and participate in field-level merges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Stable event identifier.
    pub id: String,
    /// Event title.
    pub title: String,
    /// Start instant.
    pub start: DateTime<Utc>,
    /// End instant.
    pub end: DateTime<Utc>,
    /// When this copy was last modified.
    pub last_modified: DateTime<Utc>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Location text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Identifier of the calendar this event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
}

impl CalendarEvent {
    /// Creates an event with no optional fields set.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            last_modified,
            description: None,
            location: None,
            calendar_id: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the calendar id.
    #[must_use]
    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = Some(calendar_id.into());
        self
    }

    /// Returns true if this copy was modified strictly after `other`.
    pub fn is_newer_than(&self, other: &CalendarEvent) -> bool {
        self.last_modified > other.last_modified
    }
}
