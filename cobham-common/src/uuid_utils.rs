//! UUID helpers
//!
//! Identifiers are stored as hyphenated TEXT in SQLite.

use crate::{Error, Result};
use uuid::Uuid;

/// Generate a new random (v4) identifier
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse a UUID string, naming the offending field on failure
pub fn parse(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| Error::InvalidInput(format!("Invalid UUID format for {}", field)))
}

/// Parse a UUID read back from a TEXT column
pub fn from_db(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Corrupt identifier '{}' in database: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_v4() {
        assert_eq!(generate().get_version_num(), 4);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let id = generate();
        let parsed = parse(&format!("  {}  ", id), "songId").unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_names_field() {
        let err = parse("not-a-uuid", "playlistId").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input: Invalid UUID format for playlistId"
        );
    }
}
