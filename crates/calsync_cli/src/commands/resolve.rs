//! Resolve command implementation.

use super::load_json;
use calsync_protocol::{resolve, CalendarEvent, ConflictStrategy, Resolution};
use serde::Serialize;
use std::path::Path;

/// Outcome of resolving one conflict.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResolveReport {
    /// A winner was chosen.
    Resolved {
        /// Strategy used.
        strategy: ConflictStrategy,
        /// Winning copy.
        winner: CalendarEvent,
    },
    /// The strategy defers to the user.
    AskUser {
        /// Event both copies refer to.
        event_id: String,
        /// The local copy.
        local: CalendarEvent,
        /// The server copy.
        server: CalendarEvent,
    },
}

impl ResolveReport {
    /// Resolves `local` against `server`.
    pub fn new(local: &CalendarEvent, server: &CalendarEvent, strategy: ConflictStrategy) -> Self {
        match resolve(local, server, strategy) {
            Resolution::Resolved(winner) => ResolveReport::Resolved { strategy, winner },
            Resolution::AskUser(conflict) => ResolveReport::AskUser {
                event_id: conflict.event_id().to_owned(),
                local: conflict.local,
                server: conflict.server,
            },
        }
    }
}

/// Runs the resolve command.
pub fn run(
    local: &Path,
    server: &Path,
    strategy: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let strategy: ConflictStrategy = strategy.parse()?;
    let local: CalendarEvent = load_json(local)?;
    let server: CalendarEvent = load_json(server)?;
    let report = ResolveReport::new(&local, &server, strategy);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => match &report {
            ResolveReport::Resolved { strategy, winner } => {
                println!("Strategy:      {}", strategy);
                println!("Winner id:     {}", winner.id);
                println!("Title:         {}", winner.title);
                println!("Start:         {}", winner.start);
                println!("End:           {}", winner.end);
                println!("Last modified: {}", winner.last_modified);
            }
            ResolveReport::AskUser {
                event_id,
                local,
                server,
            } => {
                println!("Event {} needs a decision:", event_id);
                println!("  local:  {} (modified {})", local.title, local.last_modified);
                println!("  server: {} (modified {})", server.title, server.last_modified);
            }
        },
    }
    Ok(())
}
