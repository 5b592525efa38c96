//! Trigger, callback and chat relay endpoints under `/functions/v1`.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::database::entities::VideoStatus;
use crate::errors::{formatter, CoreError, CoreErrorKind, CoreResult};
use crate::server::app::AppState;
use crate::server::extractors::bearer_token;
use crate::workflow::{extract_chat_response, ChatPayload, TriggerPayload, Webhook};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeVideoRequest {
    pub video_id: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCallback {
    pub video_id: Option<String>,
    pub status: Option<String>,
    pub analysis_data: Option<Value>,
    pub error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub question: Option<String>,
    pub video_id: Option<String>,
    #[serde(default)]
    pub analysis_data: Value,
    pub chat_history: Option<Value>,
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> CoreResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        CoreError::validation("Invalid JSON body").with_field("details", e.to_string())
    })
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn video_not_found(video_id: &str) -> CoreError {
    CoreError::new(CoreErrorKind::NotFound, "Video not found").with_field("videoId", video_id)
}

pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> CoreError {
    CoreError::method_not_allowed()
}

/// Forwards an uploaded video to the analysis webhook without waiting for
/// the result, which arrives later through [`receive_analysis`].
pub async fn analyze_video(
    State(state): State<AppState>,
    body: Bytes,
) -> CoreResult<impl IntoResponse> {
    let request: AnalyzeVideoRequest = parse_body(&body)?;
    let (Some(video_id), Some(file_name)) =
        (required(request.video_id), required(request.file_name))
    else {
        return Err(CoreError::validation(
            "Missing required fields: videoId, fileName",
        ));
    };

    if !state.workflow.is_configured(Webhook::Analyze) {
        error!("{} not configured", Webhook::Analyze.env_key());
        return Err(CoreError::internal("N8N webhook URL not configured"));
    }

    let record = state
        .videos
        .find(&video_id)
        .await?
        .ok_or_else(|| video_not_found(&video_id))?;

    let Some(video_url) = record.video_url.clone() else {
        return Err(
            CoreError::validation("Video URL not set").with_field("videoId", video_id.as_str())
        );
    };

    let callback_url = state.config.callback_url();
    let payload = TriggerPayload {
        video_id: video_id.clone(),
        video_url,
        file_name,
        file_size: request.file_size.or(record.file_size),
        callback_url: callback_url.clone(),
        timestamp: Utc::now(),
    };

    match state.workflow.trigger_analysis(&payload).await {
        Ok(ack) => {
            info!("Video {} queued for analysis: {}", video_id, ack);
            Ok(Json(json!({
                "success": true,
                "videoId": video_id,
                "message": "Video queued for analysis",
                "callbackUrl": callback_url,
            })))
        }
        Err(e) => {
            formatter::log_error(
                "n8n",
                &e.to_failure(),
                "analyze-video",
                Some(&json!({ "videoId": video_id })),
            );
            let message = format!("Failed to send to N8N: {}", e);
            if let Err(mark) = state.videos.mark_failed(&video_id, &message).await {
                warn!("Could not mark video {} as failed: {}", video_id, mark);
            }
            Err(CoreError::upstream("Failed to send to N8N")
                .with_field("status", e.status())
                .with_field("details", e.details()))
        }
    }
}

/// Receives the workflow engine's completion or failure report.
pub async fn receive_analysis(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> CoreResult<impl IntoResponse> {
    if let Some(secret) = state.config.workflow.callback_secret.as_deref() {
        if bearer_token(&headers) != Some(secret) {
            warn!("Rejected analysis callback with missing or wrong secret");
            return Err(CoreError::unauthorized("Unauthorized"));
        }
    }

    let callback: AnalysisCallback = parse_body(&body)?;
    let (Some(video_id), Some(status)) =
        (required(callback.video_id), required(callback.status))
    else {
        return Err(CoreError::validation(
            "Missing required fields: videoId, status",
        ));
    };

    let status = match status.parse::<VideoStatus>() {
        Ok(status) if status.is_terminal() => status,
        _ => {
            warn!("Invalid callback status '{}' for video {}", status, video_id);
            return Err(CoreError::validation(
                "Invalid status. Must be 'completed' or 'failed'",
            ));
        }
    };

    info!("Processing callback for video {} with status {}", video_id, status);
    let updated = state
        .videos
        .apply_callback(
            &video_id,
            status,
            callback.analysis_data,
            callback.error_message.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "videoId": updated.id,
        "status": updated.status,
        "message": "Analysis callback received and processed",
    })))
}

/// Relays a question to the chat webhook. The transcript is persisted by
/// the caller through the chat-history endpoint.
pub async fn ask_about_video(
    State(state): State<AppState>,
    body: Bytes,
) -> CoreResult<impl IntoResponse> {
    let request: ChatRequest = parse_body(&body)?;
    let (Some(question), Some(video_id)) =
        (required(request.question), required(request.video_id))
    else {
        return Err(CoreError::validation(
            "Missing required fields: question, videoId",
        ));
    };

    if !state.workflow.is_configured(Webhook::Chat) {
        error!("{} not configured", Webhook::Chat.env_key());
        return Err(CoreError::internal("Chat webhook URL not configured"));
    }

    let payload = ChatPayload {
        question,
        video_id: video_id.clone(),
        analysis_data: request.analysis_data,
        chat_history: request.chat_history.unwrap_or_else(|| json!([])),
        timestamp: Utc::now(),
    };

    match state.workflow.ask(&payload).await {
        Ok(body) => Ok(Json(json!({
            "success": true,
            "videoId": video_id,
            "response": extract_chat_response(&body),
        }))),
        Err(e) => {
            formatter::log_error(
                "n8n",
                &e.to_failure(),
                "ask-about-video",
                Some(&json!({ "videoId": video_id })),
            );
            Err(CoreError::upstream("Failed to process question")
                .with_field("status", e.status())
                .with_field("details", e.details()))
        }
    }
}
