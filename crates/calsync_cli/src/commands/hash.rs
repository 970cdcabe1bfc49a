//! Hash command implementation.

use super::load_events;
use calsync_protocol::{CalendarEvent, ContentHash};
use serde::Serialize;
use std::path::Path;

/// Content hash report.
#[derive(Debug, Serialize)]
pub struct HashReport {
    /// Input path.
    pub path: String,
    /// Number of events hashed.
    pub event_count: usize,
    /// Hex-encoded content hash.
    pub hash: String,
}

impl HashReport {
    /// Builds the report for an event list.
    pub fn new(path: &Path, events: &[CalendarEvent]) -> Self {
        Self {
            path: path.display().to_string(),
            event_count: events.len(),
            hash: ContentHash::of(events).to_hex(),
        }
    }
}

/// Runs the hash command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let events = load_events(path)?;
    let report = HashReport::new(path, &events);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            println!("Path:   {}", report.path);
            println!("Events: {}", report.event_count);
            println!("Hash:   {}", report.hash);
        }
    }
    Ok(())
}
