//! Request field validation

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::error::AppError;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Fail with "Missing required fields: a, b" when any value is absent or blank
pub fn require_fields(fields: &[(&str, Option<&str>)]) -> Result<(), AppError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Parse a UUID, naming the field in the error message
pub fn uuid(value: &str, field: &str) -> Result<Uuid, AppError> {
    Ok(cobham_common::uuid_utils::parse(value, field)?)
}

pub fn email(value: &str) -> Result<(), AppError> {
    if EMAIL_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid email format".to_string()))
    }
}

/// Form booleans arrive as `true` or `"true"`
pub fn truthy(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("true") | Some("1"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_fields_lists_all_missing() {
        let err = require_fields(&[("id", None), ("email", Some("  ")), ("name", Some("x"))])
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields: id, email");
    }

    #[test]
    fn test_require_fields_ok() {
        assert!(require_fields(&[("title", Some("Song"))]).is_ok());
    }

    #[test]
    fn test_uuid_error_names_field() {
        let err = uuid("123", "songId").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Invalid UUID format for songId");
    }

    #[test]
    fn test_email_format() {
        assert!(email("listener@cobham.fm").is_ok());
        assert!(email("no-at-sign.com").is_err());
        assert!(email("two@@x.com").is_err());
        assert!(email("spaces in@x.com").is_err());
        assert!(email("user@nodot").is_err());
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(Some("true")));
        assert!(truthy(Some("1")));
        assert!(!truthy(Some("false")));
        assert!(!truthy(None));
    }
}
