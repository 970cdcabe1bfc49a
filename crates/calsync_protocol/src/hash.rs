//! Order-independent content hashing over event sets.

use crate::event::CalendarEvent;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 digest over the tracked fields of an event set.
///
/// Each event is digested over `(id, title, start, end, last_modified)`.
/// The per-event digests are sorted before being folded into the final
/// digest, so two sets that differ only in ordering hash identically.
/// Fields outside that tuple do not affect the hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Computes the content hash of an event set.
    pub fn of(events: &[CalendarEvent]) -> Self {
        let mut digests: Vec<[u8; 32]> = events.iter().map(event_digest).collect();
        digests.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update((digests.len() as u64).to_le_bytes());
        for digest in &digests {
            hasher.update(digest);
        }
        Self(hasher.finalize().into())
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase hex encoding of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn event_digest(event: &CalendarEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    write_field(&mut hasher, event.id.as_bytes());
    write_field(&mut hasher, event.title.as_bytes());
    write_field(&mut hasher, timestamp(&event.start).as_bytes());
    write_field(&mut hasher, timestamp(&event.end).as_bytes());
    write_field(&mut hasher, timestamp(&event.last_modified).as_bytes());
    hasher.finalize().into()
}

// Length-prefixed so adjacent fields cannot bleed into each other.
fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
