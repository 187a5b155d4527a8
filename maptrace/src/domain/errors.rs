//! Structured error types for maptrace
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only registry builds fail with an error; memory probing degrades silently
//! and lookups report absence through `Option`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapsError {
    #[error("Failed to read memory map snapshot {}", path.display())]
    SnapshotUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed memory map line {line_no}: {line:?}")]
    MalformedLine { line_no: usize, line: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_line_display() {
        let err = MapsError::MalformedLine { line_no: 3, line: "garbage".to_string() };
        assert_eq!(err.to_string(), "Malformed memory map line 3: \"garbage\"");
    }

    #[test]
    fn test_snapshot_unavailable_keeps_source() {
        let err = MapsError::SnapshotUnavailable {
            path: PathBuf::from("/proc/self/nope"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/proc/self/nope"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
