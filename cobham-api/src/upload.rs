//! Form input for create/update routes
//!
//! Routes that accept media take `multipart/form-data`; the same routes also
//! accept a plain JSON object when no file is sent. Either way handlers see
//! a flat map of text fields plus the uploaded files.
//!
//! File rules:
//! - `audio` must be an `audio/*` file
//! - `cover` and `avatar` must be `image/*` files
//! - any other file field is rejected
//! - each file is limited to 50 MB

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use cobham_common::sanitize::clean;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::AppError;

/// Per-file size limit
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Whole-request limit: one full-size file plus form overhead
pub const MAX_BODY_SIZE: usize = MAX_FILE_SIZE + 5 * 1024 * 1024;

const FILE_TOO_LARGE: &str = "File is too large (max 50MB).";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Text fields and files from a multipart or JSON request body
#[derive(Debug, Default)]
pub struct FormInput {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormInput {
    /// Trimmed field value; empty strings count as absent
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Field value as sent, distinguishing "absent" from "empty"
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn flag(&self, name: &str) -> bool {
        crate::validation::truthy(self.raw(name))
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    /// Reject files this route does not accept
    pub fn allow_files(&self, allowed: &[&str]) -> Result<(), AppError> {
        if self.files.keys().any(|k| !allowed.contains(&k.as_str())) {
            return Err(unexpected_field());
        }
        Ok(())
    }

    /// Build from a JSON object (values arrive already sanitized)
    pub fn from_json(value: Value) -> Result<Self, AppError> {
        let Value::Object(map) = value else {
            return Err(AppError::BadRequest("Request body must be a JSON object".to_string()));
        };

        let fields = map
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::Null => return None,
                    Value::String(s) => s,
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    other => other.to_string(),
                };
                Some((key, text))
            })
            .collect();

        Ok(Self {
            fields,
            files: HashMap::new(),
        })
    }
}

fn unexpected_field() -> AppError {
    AppError::BadRequest("Unexpected field.".to_string())
}

/// Check the MIME type expected for a file field
fn check_file_field(field: &str, content_type: &str) -> Result<(), AppError> {
    match field {
        "audio" if !content_type.starts_with("audio/") => Err(AppError::BadRequest(
            "Only audio files are allowed for the audio field.".to_string(),
        )),
        "cover" | "avatar" if !content_type.starts_with("image/") => Err(AppError::BadRequest(
            format!("Only image files are allowed for the {} field.", field),
        )),
        "audio" | "cover" | "avatar" => Ok(()),
        _ => Err(unexpected_field()),
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BadRequest(FILE_TOO_LARGE.to_string())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormInput
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;

            let mut form = FormInput::default();
            while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };

                match field.file_name().map(str::to_string) {
                    Some(file_name) => {
                        let mime = field
                            .content_type()
                            .unwrap_or("application/octet-stream")
                            .to_string();
                        check_file_field(&name, &mime)?;

                        let bytes = field.bytes().await.map_err(multipart_error)?;
                        if bytes.len() > MAX_FILE_SIZE {
                            return Err(AppError::BadRequest(FILE_TOO_LARGE.to_string()));
                        }

                        form.files.insert(
                            name,
                            UploadedFile {
                                file_name,
                                content_type: mime,
                                bytes,
                            },
                        );
                    }
                    None => {
                        let text = field.text().await.map_err(multipart_error)?;
                        form.fields.insert(name, clean(&text));
                    }
                }
            }
            return Ok(form);
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(FormInput::default());
        }

        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;
        FormInput::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_field_rules() {
        assert!(check_file_field("audio", "audio/mpeg").is_ok());
        assert!(check_file_field("cover", "image/png").is_ok());
        assert!(check_file_field("avatar", "image/jpeg").is_ok());

        assert_eq!(
            check_file_field("audio", "image/png").unwrap_err().to_string(),
            "Only audio files are allowed for the audio field."
        );
        assert_eq!(
            check_file_field("avatar", "audio/mpeg").unwrap_err().to_string(),
            "Only image files are allowed for the avatar field."
        );
        assert_eq!(
            check_file_field("banner", "image/png").unwrap_err().to_string(),
            "Unexpected field."
        );
    }

    #[test]
    fn test_from_json_flattens_scalars() {
        let form = FormInput::from_json(json!({
            "title": "Night Drive",
            "isPrivate": true,
            "duration": 200,
            "description": null,
            "genre": "  "
        }))
        .unwrap();

        assert_eq!(form.text("title"), Some("Night Drive"));
        assert!(form.flag("isPrivate"));
        assert_eq!(form.text("duration"), Some("200"));
        assert_eq!(form.raw("description"), None);
        assert_eq!(form.text("genre"), None);
        assert_eq!(form.raw("genre"), Some("  "));
    }

    #[test]
    fn test_from_json_rejects_arrays() {
        assert!(FormInput::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_allow_files() {
        let mut form = FormInput::default();
        form.files.insert(
            "audio".into(),
            UploadedFile {
                file_name: "a.mp3".into(),
                content_type: "audio/mpeg".into(),
                bytes: Bytes::new(),
            },
        );
        assert!(form.allow_files(&["audio", "cover"]).is_ok());
        assert!(form.allow_files(&["cover"]).is_err());
    }
}
