//! Listening history and the server-side play queue

use axum::{
    extract::{Query, State},
    routing::post,
    Extension, Router,
};
use cobham_common::api::ApiResponse;
use serde::Deserialize;
use serde_json::Value;

use super::authenticated;
use crate::db::player::{self, QueueItem};
use crate::db::songs;
use crate::dto::{HistoryDto, QueueEntryDto};
use crate::error::{ApiResult, AppError};
use crate::extract::ApiJson;
use crate::identity::AuthUser;
use crate::services::profiles;
use crate::validation;
use crate::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBody {
    pub song_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<String>,
}

fn history_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| v.min(MAX_HISTORY_LIMIT))
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
}

/// Validate `{ items: [{ songId, position }] }`
fn queue_items(body: &Value) -> ApiResult<Vec<QueueItem>> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::BadRequest("Queue items must be an array.".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let song_id = item.get("songId").and_then(Value::as_str);
            let position = item.get("position").filter(|v| !v.is_null());
            if song_id.is_none() || position.is_none() {
                return Err(AppError::BadRequest(format!(
                    "Queue item at index {} needs songId and position.",
                    index
                )));
            }

            let song_id = validation::uuid(
                song_id.unwrap_or_default(),
                &format!("song id at index {}", index),
            )?;
            let position = position.and_then(Value::as_i64).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Queue position at index {} must be an integer.",
                    index
                ))
            })?;

            Ok(QueueItem { song_id, position })
        })
        .collect()
}

/// POST /api/player/history
pub async fn add_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<HistoryBody>,
) -> ApiResult<ApiResponse<()>> {
    validation::require_fields(&[("songId", body.song_id.as_deref())])?;
    let song_id = validation::uuid(body.song_id.as_deref().unwrap_or_default(), "song id")?;
    profiles::require_user(&state, user.id).await?;

    if !songs::exists(&state.db, song_id).await? {
        return Err(AppError::NotFound("Song not found".to_string()));
    }

    player::add_history(&state.db, user.id, song_id).await?;
    Ok(ApiResponse::message("Added to history."))
}

/// GET /api/player/history?limit=
pub async fn get_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<ApiResponse<Vec<HistoryDto>>> {
    let limit = history_limit(query.limit.as_deref());
    let entries = player::list_history(&state.db, user.id, limit).await?;
    Ok(ApiResponse::ok(HistoryDto::build_all(&state.storage, entries).await))
}

/// POST /api/player/queue
pub async fn update_queue(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<ApiResponse<Vec<QueueEntryDto>>> {
    let items = queue_items(&body)?;
    profiles::require_user(&state, user.id).await?;

    player::replace_queue(&state.db, user.id, &items).await?;
    tracing::debug!(user_id = %user.id, items = items.len(), "Replaced play queue");

    let entries = player::list_queue(&state.db, user.id).await?;
    Ok(ApiResponse::with_message(
        QueueEntryDto::build_all(&state.storage, entries).await,
        "Queue updated.",
    ))
}

/// GET /api/player/queue
pub async fn get_queue(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ApiResponse<Vec<QueueEntryDto>>> {
    let entries = player::list_queue(&state.db, user.id).await?;
    Ok(ApiResponse::ok(QueueEntryDto::build_all(&state.storage, entries).await))
}

pub fn player_routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/api/player/history", post(add_history).get(get_history))
            .route("/api/player/queue", post(update_queue).get(get_queue)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_limit() {
        assert_eq!(history_limit(None), 20);
        assert_eq!(history_limit(Some("5")), 5);
        assert_eq!(history_limit(Some("500")), 100);
        assert_eq!(history_limit(Some("0")), 20);
        assert_eq!(history_limit(Some("abc")), 20);
    }

    #[test]
    fn test_queue_items_must_be_array() {
        let err = queue_items(&json!({ "items": "nope" })).unwrap_err();
        assert_eq!(err.to_string(), "Queue items must be an array.");

        let err = queue_items(&json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Queue items must be an array.");
    }

    #[test]
    fn test_queue_items_parsed() {
        let id = uuid::Uuid::new_v4();
        let items = queue_items(&json!({
            "items": [{ "songId": id.to_string(), "position": 3 }]
        }))
        .unwrap();
        assert_eq!(items, vec![QueueItem { song_id: id, position: 3 }]);
    }

    #[test]
    fn test_queue_item_position_must_be_integer() {
        let id = uuid::Uuid::new_v4().to_string();
        let err = queue_items(&json!({ "items": [{ "songId": id, "position": 1.5 }] })).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let err = queue_items(&json!({ "items": [{ "songId": "bad", "position": 0 }] })).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
