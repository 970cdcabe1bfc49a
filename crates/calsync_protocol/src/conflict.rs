//! Conflict detection and resolution between local and server copies.

use crate::event::CalendarEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Policy used to pick a winner between two copies of the same event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Server copy always wins.
    #[default]
    ServerWins,
    /// Local copy always wins.
    ClientWins,
    /// Newer copy wins; ties are merged field by field.
    Merge,
    /// Decline to decide; the user resolves interactively.
    AskUser,
}

impl ConflictStrategy {
    /// Returns true if this strategy always produces a winner.
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ConflictStrategy::AskUser)
    }

    /// Returns the canonical name of this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::ServerWins => "server_wins",
            ConflictStrategy::ClientWins => "client_wins",
            ConflictStrategy::Merge => "merge",
            ConflictStrategy::AskUser => "ask_user",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a strategy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown conflict strategy: {0}")]
pub struct ParseStrategyError(String);

impl FromStr for ConflictStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "server_wins" | "server" => Ok(ConflictStrategy::ServerWins),
            "client_wins" | "client" | "local" => Ok(ConflictStrategy::ClientWins),
            "merge" => Ok(ConflictStrategy::Merge),
            "ask_user" | "ask" => Ok(ConflictStrategy::AskUser),
            _ => Err(ParseStrategyError(s.to_owned())),
        }
    }
}

/// Two divergent copies of the same logical event.
///
/// Only exists while a conflict is being resolved; the outcome is a
/// single canonical copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The locally held copy.
    pub local: CalendarEvent,
    /// The copy fetched from the server.
    pub server: CalendarEvent,
}

impl Conflict {
    /// Creates a conflict from a local and a server copy.
    pub fn new(local: CalendarEvent, server: CalendarEvent) -> Self {
        Self { local, server }
    }

    /// Returns the event id (always the server's).
    pub fn event_id(&self) -> &str {
        &self.server.id
    }

    /// Resolves this conflict with the given strategy.
    pub fn resolve(&self, strategy: ConflictStrategy) -> Resolution {
        resolve(&self.local, &self.server, strategy)
    }
}

/// Outcome of conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A winning copy was chosen; it becomes canonical.
    Resolved(CalendarEvent),
    /// Interactive resolution is required. This is a control-flow signal,
    /// not an error.
    AskUser(Conflict),
}

impl Resolution {
    /// Returns the winning copy, if one was chosen.
    pub fn winner(&self) -> Option<&CalendarEvent> {
        match self {
            Resolution::Resolved(event) => Some(event),
            Resolution::AskUser(_) => None,
        }
    }

    /// Consumes the resolution and returns the winning copy, if any.
    pub fn into_winner(self) -> Option<CalendarEvent> {
        match self {
            Resolution::Resolved(event) => Some(event),
            Resolution::AskUser(_) => None,
        }
    }

    /// Returns true if the user must decide.
    pub fn requires_user(&self) -> bool {
        matches!(self, Resolution::AskUser(_))
    }
}

/// Picks a winner between `local` and `server` using `strategy`.
///
/// Merged records are stamped with the current time.
pub fn resolve(
    local: &CalendarEvent,
    server: &CalendarEvent,
    strategy: ConflictStrategy,
) -> Resolution {
    resolve_at(local, server, strategy, Utc::now())
}

/// Same as [`resolve`] with an explicit resolution time.
pub fn resolve_at(
    local: &CalendarEvent,
    server: &CalendarEvent,
    strategy: ConflictStrategy,
    now: DateTime<Utc>,
) -> Resolution {
    match strategy {
        ConflictStrategy::ServerWins => Resolution::Resolved(server.clone()),
        ConflictStrategy::ClientWins => Resolution::Resolved(local.clone()),
        ConflictStrategy::Merge => Resolution::Resolved(merge(local, server, now)),
        ConflictStrategy::AskUser => {
            Resolution::AskUser(Conflict::new(local.clone(), server.clone()))
        }
    }
}

fn merge(local: &CalendarEvent, server: &CalendarEvent, now: DateTime<Utc>) -> CalendarEvent {
    if local.is_newer_than(server) {
        return CalendarEvent {
            id: server.id.clone(),
            ..local.clone()
        };
    }
    if server.is_newer_than(local) {
        return server.clone();
    }

    // Exact tie: local wins every field it sets, identity stays with the server.
    CalendarEvent {
        id: server.id.clone(),
        title: local.title.clone(),
        start: local.start,
        end: local.end,
        last_modified: now,
        description: local.description.clone().or_else(|| server.description.clone()),
        location: local.location.clone().or_else(|| server.location.clone()),
        calendar_id: local.calendar_id.clone().or_else(|| server.calendar_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, minute, 0).unwrap()
    }

    fn copy(id: &str, title: &str, modified: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent::new(id, title, t(30), t(45), modified)
    }

    #[test]
    fn server_wins_is_default() {
        assert_eq!(ConflictStrategy::default(), ConflictStrategy::ServerWins);

        let local = copy("ev1", "local", t(5));
        let server = copy("ev1", "server", t(1));
        let outcome = resolve(&local, &server, ConflictStrategy::default());
        assert_eq!(outcome.winner(), Some(&server));
    }

    #[test]
    fn client_wins_returns_local() {
        let local = copy("ev1", "local", t(1));
        let server = copy("ev1", "server", t(5));
        let outcome = resolve(&local, &server, ConflictStrategy::ClientWins);
        assert_eq!(outcome.into_winner(), Some(local));
    }

    #[test]
    fn merge_prefers_strictly_newer_local_but_keeps_server_id() {
        let local = copy("local-id", "local", t(9));
        let server = copy("server-id", "server", t(2));
        let merged = resolve(&local, &server, ConflictStrategy::Merge)
            .into_winner()
            .unwrap();

        assert_eq!(merged.id, "server-id");
        assert_eq!(merged.title, "local");
        assert_eq!(merged.last_modified, t(9));
    }

    #[test]
    fn merge_prefers_strictly_newer_server() {
        let local = copy("ev1", "local", t(2)).with_location("desk");
        let server = copy("ev1", "server", t(9));
        let merged = resolve(&local, &server, ConflictStrategy::Merge)
            .into_winner()
            .unwrap();
        assert_eq!(merged, server);
    }

    #[test]
    fn merge_on_tie_combines_fields_and_stamps_now() {
        let local = copy("ev1", "local title", t(3)).with_description("local notes");
        let server = copy("ev1", "server title", t(3))
            .with_description("server notes")
            .with_location("room 7");
        let now = t(59);

        let merged = resolve_at(&local, &server, ConflictStrategy::Merge, now)
            .into_winner()
            .unwrap();

        assert_eq!(merged.id, "ev1");
        assert_eq!(merged.title, "local title");
        assert_eq!(merged.description.as_deref(), Some("local notes"));
        assert_eq!(merged.location.as_deref(), Some("room 7"));
        assert_eq!(merged.last_modified, now);
    }

    #[test]
    fn ask_user_declines_to_decide() {
        let local = copy("ev1", "local", t(1));
        let server = copy("ev1", "server", t(2));
        let outcome = resolve(&local, &server, ConflictStrategy::AskUser);

        assert!(outcome.requires_user());
        assert!(outcome.winner().is_none());
        match outcome {
            Resolution::AskUser(conflict) => {
                assert_eq!(conflict.local, local);
                assert_eq!(conflict.server, server);
                assert_eq!(conflict.event_id(), "ev1");
            }
            Resolution::Resolved(_) => panic!("ask_user must not pick a winner"),
        }
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!("merge".parse::<ConflictStrategy>(), Ok(ConflictStrategy::Merge));
        assert_eq!("server-wins".parse::<ConflictStrategy>(), Ok(ConflictStrategy::ServerWins));
        assert_eq!("CLIENT_WINS".parse::<ConflictStrategy>(), Ok(ConflictStrategy::ClientWins));
        assert_eq!("ask".parse::<ConflictStrategy>(), Ok(ConflictStrategy::AskUser));
        assert!("coin-flip".parse::<ConflictStrategy>().is_err());

        for strategy in [
            ConflictStrategy::ServerWins,
            ConflictStrategy::ClientWins,
            ConflictStrategy::Merge,
            ConflictStrategy::AskUser,
        ] {
            assert_eq!(strategy.to_string().parse::<ConflictStrategy>(), Ok(strategy));
        }
    }

    #[test]
    fn auto_resolution() {
        assert!(ConflictStrategy::Merge.auto_resolves());
        assert!(!ConflictStrategy::AskUser.auto_resolves());
    }

    proptest! {
        #[test]
        fn merge_winner_always_carries_server_id(
            local_offset in -600i64..600,
            server_offset in -600i64..600,
        ) {
            let local = CalendarEvent::new("l", "local", t(30), t(45), t(0) + Duration::seconds(local_offset));
            let server = CalendarEvent::new("s", "server", t(30), t(45), t(0) + Duration::seconds(server_offset));
            let merged = resolve(&local, &server, ConflictStrategy::Merge).into_winner().unwrap();
            prop_assert_eq!(merged.id.as_str(), "s");
            if local_offset > server_offset {
                prop_assert_eq!(merged.title.as_str(), "local");
            } else if server_offset > local_offset {
                prop_assert_eq!(merged.title.as_str(), "server");
            }
        }
    }
}
