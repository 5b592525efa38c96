use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::entities::{video_analyses, ChatMessage};
use crate::errors::{CoreError, CoreResult};
use crate::server::app::AppState;
use crate::server::extractors::CurrentUser;

/// Header carrying the original name of an uploaded file.
pub const FILE_NAME_HEADER: &str = "x-file-name";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnalysisRequest {
    pub file_name: String,
    pub file_size: i64,
    pub duration: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetUrlRequest {
    pub video_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryRequest {
    pub chat_history: Vec<ChatMessage>,
}

pub async fn create_analysis(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<CreateAnalysisRequest>,
) -> CoreResult<Json<video_analyses::Model>> {
    let record = state
        .videos
        .create(
            current.user.id,
            &payload.file_name,
            payload.file_size,
            payload.duration,
        )
        .await?;
    Ok(Json(record))
}

pub async fn list_analyses(
    State(state): State<AppState>,
    current: CurrentUser,
) -> CoreResult<Json<Vec<video_analyses::Model>>> {
    Ok(Json(state.videos.list(current.user.id).await?))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> CoreResult<Json<video_analyses::Model>> {
    state
        .videos
        .get(current.user.id, &id)
        .await?
        .map(Json)
        .ok_or_else(|| CoreError::not_found("VideoAnalysis", id))
}

pub async fn delete_analysis(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> CoreResult<StatusCode> {
    state.videos.delete(current.user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stores the raw request body as the video binary.
pub async fn upload_video(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> CoreResult<Json<Value>> {
    if body.is_empty() {
        return Err(CoreError::validation("Upload body is empty"));
    }
    let supplied_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok());

    let public_url = state
        .videos
        .upload(current.user.id, &id, body, supplied_name)
        .await?;
    Ok(Json(json!({ "publicUrl": public_url })))
}

/// Streams the caller's stored video back as an attachment.
pub async fn download_video(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> CoreResult<impl IntoResponse> {
    let (key, data) = state.videos.download(current.user.id, &id).await?;
    let file_name = key.rsplit('/').next().unwrap_or(key.as_str()).to_string();
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        data,
    ))
}

pub async fn set_video_url(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<SetUrlRequest>,
) -> CoreResult<Json<video_analyses::Model>> {
    let record = state
        .videos
        .set_url(current.user.id, &id, &payload.video_url)
        .await?;
    Ok(Json(record))
}

pub async fn update_chat_history(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<ChatHistoryRequest>,
) -> CoreResult<Json<video_analyses::Model>> {
    let record = state
        .videos
        .update_chat_history(current.user.id, &id, &payload.chat_history)
        .await?;
    Ok(Json(record))
}
