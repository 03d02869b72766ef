//! Opaque source identifiers.

use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of generated source identifiers.
pub const SOURCE_ID_LEN: usize = 24;

/// Maximum accepted length when parsing client-supplied identifiers.
const MAX_SOURCE_ID_LEN: usize = 64;

/// Opaque identifier assigned to an uploaded video.
///
/// Identifiers are alphanumeric only, so they are always safe to embed
/// in filenames without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

/// Error returned when a client-supplied identifier is malformed.
#[derive(Debug, Error)]
#[error("invalid source id: {0}")]
pub struct InvalidSourceId(pub String);

impl SourceId {
    /// Generate a new random identifier.
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SOURCE_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Parse a client-supplied identifier, rejecting anything that is
    /// not purely alphanumeric (path traversal guard).
    pub fn parse(s: &str) -> Result<Self, InvalidSourceId> {
        if s.is_empty() || s.len() > MAX_SOURCE_ID_LEN {
            return Err(InvalidSourceId(s.to_string()));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InvalidSourceId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_alphanumeric_and_sized() {
        let id = SourceId::generate();
        assert_eq!(id.as_str().len(), SOURCE_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(SourceId::generate(), SourceId::generate());
    }

    #[test]
    fn parse_rejects_path_traversal() {
        assert!(SourceId::parse("../etc/passwd").is_err());
        assert!(SourceId::parse("a/b").is_err());
        assert!(SourceId::parse("").is_err());
        assert!(SourceId::parse("abc123XYZ").is_ok());
    }
}
