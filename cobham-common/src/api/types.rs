//! Response envelope
//!
//! Every endpoint answers with `{ success, message, data }`; failures use
//! `{ success: false, status, message }` where `status` is `"fail"` for
//! client errors and `"error"` for server errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Successful response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T> ApiResponse<T> {
    /// 200 with the default message
    pub fn ok(data: T) -> Self {
        Self::with_message(data, "Success")
    }

    /// 200 with a custom message
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            status: StatusCode::OK,
        }
    }

    /// 201 Created
    pub fn created(data: T) -> Self {
        Self::with_message(data, "Created successfully").with_status(StatusCode::CREATED)
    }

    /// Override the HTTP status (message and data unchanged)
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl ApiResponse<()> {
    /// 200 with only a message; `data` serializes as null
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Failure envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub status: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: if status.is_client_error() { "fail" } else { "error" },
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_envelope() {
        let response = ApiResponse::ok(json!({ "id": 1 }));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({ "success": true, "message": "Success", "data": { "id": 1 } }));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_created_envelope() {
        let response = ApiResponse::created("x");
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.message, "Created successfully");
    }

    #[test]
    fn test_message_only_has_null_data() {
        let value = serde_json::to_value(ApiResponse::message("Album deleted.")).unwrap();
        assert!(value["data"].is_null());
        assert_eq!(value["message"], "Album deleted.");
    }

    #[test]
    fn test_error_status_text() {
        assert_eq!(ErrorBody::new(StatusCode::NOT_FOUND, "x").status, "fail");
        assert_eq!(ErrorBody::new(StatusCode::BAD_GATEWAY, "x").status, "error");
        assert_eq!(ErrorBody::new(StatusCode::INTERNAL_SERVER_ERROR, "x").status, "error");
    }
}
