//! CLI command implementations.

pub mod contend;
pub mod hash;
pub mod poll;
pub mod resolve;

use calsync_protocol::CalendarEvent;
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading command input.
#[derive(Error, Debug)]
pub enum InputError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid JSON for the expected shape.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// Offending path.
        path: String,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Reads and deserializes a JSON file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| InputError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Reads a JSON array of events.
pub fn load_events(path: &Path) -> Result<Vec<CalendarEvent>, InputError> {
    load_json(path)
}


#[cfg(test)]
mod tests {
    use super::test_support::events_file;
    use super::*;
    use calsync_testkit::sample_day;
    use std::io::Write;

    #[test]
    fn load_events_roundtrips_fixture() {
        let file = events_file(&sample_day());
        assert_eq!(load_events(file.path()).unwrap(), sample_day());
    }

    #[test]
    fn load_events_reports_missing_file() {
        let err = load_events(Path::new("/nonexistent/events.json")).unwrap_err();
        assert!(matches!(err, InputError::Read { .. }));
    }

    #[test]
    fn load_events_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"not\": \"a list\"}}").unwrap();
        let err = load_events(file.path()).unwrap_err();
        assert!(matches!(err, InputError::Parse { .. }));
        assert!(err.to_string().contains("cannot parse"));
    }
}
