//! Typed HTTP wrapper over the video analysis API.
//!
//! Record operations go through `/api/v1` with the caller's session token;
//! trigger and chat go through the `/functions/v1` endpoints.

pub mod poller;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::database::entities::{video_analyses, ChatMessage};
use crate::http::interceptor::{NoopInterceptor, SharedInterceptor};

pub use poller::{AnalysisPoller, AnalysisSource, AnalyzerSession, PollOutcome};

pub type VideoAnalysis = video_analyses::Model;

const TRIGGER_FALLBACK: &str = "Failed to trigger analysis";
const CHAT_FALLBACK: &str = "Failed to send message";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No authenticated user")]
    NotAuthenticated,

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Picks the most useful message out of an error response body: the JSON
/// `error` field, else the raw text, else `fallback`.
pub fn extract_error_message(body: &str, fallback: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(message) = map.get("error").and_then(Value::as_str) {
            if !message.trim().is_empty() {
                return message.to_string();
            }
        }
    }
    match body.trim() {
        "" => fallback.to_string(),
        text => text.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct VideoAnalysisClient {
    http: reqwest::Client,
    base_url: String,
    session: Option<String>,
    interceptor: SharedInterceptor,
}

impl VideoAnalysisClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: None,
            interceptor: Arc::new(NoopInterceptor),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session = Some(session_id.into());
        self
    }

    pub fn with_interceptor(mut self, interceptor: SharedInterceptor) -> Self {
        self.interceptor = interceptor;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Opens a session and returns a client bound to it.
    pub async fn login(&self, email: &str, password: &str) -> Result<(Self, Session), ClientError> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .send(Method::POST, "/api/v1/auth/login", Some(&body), false, None)
            .await?;
        let session: Session = decode(&response.text)?;
        Ok((self.clone().with_session(session.session_id.clone()), session))
    }

    pub async fn create(
        &self,
        file_name: &str,
        file_size: i64,
        duration: Option<i32>,
    ) -> Result<VideoAnalysis, ClientError> {
        let body = json!({
            "fileName": file_name,
            "fileSize": file_size,
            "duration": duration,
        });
        self.request_json(Method::POST, "/api/v1/video-analyses", Some(&body))
            .await
    }

    /// Uploads the binary for `id` and returns its public URL.
    pub async fn upload(&self, id: &str, file_name: &str, data: Bytes) -> Result<String, ClientError> {
        let token = self.session.as_deref().ok_or(ClientError::NotAuthenticated)?;
        let url = self.url(&format!("/api/v1/video-analyses/{}/upload", id));

        self.interceptor.before_request("POST", &url, None);
        let started = Instant::now();
        let result = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("X-File-Name", file_name)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await;
        self.interceptor.after_response(
            "POST",
            &url,
            result.as_ref().ok().map(|r| r.status().as_u16()),
            started.elapsed(),
        );

        let response = read(result?, None).await?;
        let body: Value = decode(&response.text)?;
        body.get("publicUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Decode("missing publicUrl".to_string()))
    }

    pub async fn set_url(&self, id: &str, video_url: &str) -> Result<VideoAnalysis, ClientError> {
        let body = json!({ "videoUrl": video_url });
        self.request_json(
            Method::PUT,
            &format!("/api/v1/video-analyses/{}/url", id),
            Some(&body),
        )
        .await
    }

    /// Asks the server to forward the video to the workflow engine.
    pub async fn trigger(&self, id: &str, file_name: &str, file_size: i64) -> Result<Value, ClientError> {
        let body = json!({
            "videoId": id,
            "fileName": file_name,
            "fileSize": file_size,
        });
        let response = self
            .send(
                Method::POST,
                "/functions/v1/analyze-video",
                Some(&body),
                false,
                Some(TRIGGER_FALLBACK),
            )
            .await?;
        decode(&response.text)
    }

    /// Fetches the current record. A missing record is `None`, not an error.
    pub async fn get(&self, id: &str) -> Result<Option<VideoAnalysis>, ClientError> {
        match self
            .request_json(Method::GET, &format!("/api/v1/video-analyses/{}", id), None)
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(ClientError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Sends a question about an analysed video and returns the assistant's answer.
    pub async fn send_chat(
        &self,
        id: &str,
        question: &str,
        analysis_data: Option<&Value>,
        history: &[ChatMessage],
    ) -> Result<String, ClientError> {
        let body = json!({
            "question": question,
            "videoId": id,
            "analysisData": analysis_data,
            "chatHistory": history,
        });
        let response = self
            .send(
                Method::POST,
                "/functions/v1/ask-about-video",
                Some(&body),
                false,
                Some(CHAT_FALLBACK),
            )
            .await?;
        let body: Value = decode(&response.text)?;
        Ok(match body.get("response") {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => response.text,
        })
    }

    pub async fn update_chat_history(
        &self,
        id: &str,
        history: &[ChatMessage],
    ) -> Result<VideoAnalysis, ClientError> {
        let body = json!({ "chatHistory": history });
        self.request_json(
            Method::PUT,
            &format!("/api/v1/video-analyses/{}/chat-history", id),
            Some(&body),
        )
        .await
    }

    pub async fn list(&self) -> Result<Vec<VideoAnalysis>, ClientError> {
        self.request_json(Method::GET, "/api/v1/video-analyses", None)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.send(
            Method::DELETE,
            &format!("/api/v1/video-analyses/{}", id),
            None,
            true,
            None,
        )
        .await?;
        Ok(())
    }

    /// Authenticated GET for the other `/api/v1` resources.
    pub async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request_json(Method::GET, path, None).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let response = self.send(method, path, body, true, None).await?;
        decode(&response.text)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        authenticated: bool,
        fallback: Option<&str>,
    ) -> Result<RawResponse, ClientError> {
        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url);
        match (&self.session, authenticated) {
            (Some(token), _) => request = request.bearer_auth(token),
            (None, true) => return Err(ClientError::NotAuthenticated),
            (None, false) => {}
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        self.interceptor.before_request(method.as_str(), &url, body);
        let started = Instant::now();
        let result = request.send().await;
        self.interceptor.after_response(
            method.as_str(),
            &url,
            result.as_ref().ok().map(|r| r.status().as_u16()),
            started.elapsed(),
        );

        read(result?, fallback).await
    }
}

struct RawResponse {
    text: String,
}

async fn read(
    response: reqwest::Response,
    fallback: Option<&str>,
) -> Result<RawResponse, ClientError> {
    let status = response.status();
    let text = response.text().await?;
    debug!("Response {} ({} bytes)", status, text.len());
    if status.is_success() {
        return Ok(RawResponse { text });
    }
    Err(ClientError::Api {
        status: status.as_u16(),
        message: extract_error_message(&text, fallback.unwrap_or_else(|| default_reason(status))),
    })
}

fn default_reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Request failed")
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ClientError> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| ClientError::Decode(e.to_string()))
}

#[async_trait]
impl AnalysisSource for VideoAnalysisClient {
    async fn fetch_analysis(&self, id: &str) -> Result<Option<VideoAnalysis>, ClientError> {
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_json_error_field() {
        let body = r#"{"error":"Video URL not set","videoId":"abc"}"#;
        assert_eq!(
            extract_error_message(body, TRIGGER_FALLBACK),
            "Video URL not set"
        );
        assert_eq!(
            extract_error_message("upstream exploded", TRIGGER_FALLBACK),
            "upstream exploded"
        );
        assert_eq!(extract_error_message("  ", CHAT_FALLBACK), "Failed to send message");
    }

    #[tokio::test]
    async fn get_maps_not_found_to_none() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/video-analyses/missing")
            .with_status(404)
            .with_body(r#"{"error":"VideoAnalysis not found"}"#)
            .create_async()
            .await;

        let client = VideoAnalysisClient::new(server.url()).with_session("token");
        let record = client.get("missing").await.unwrap();
        assert!(record.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn trigger_surfaces_server_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/functions/v1/analyze-video")
            .with_status(400)
            .with_body(r#"{"error":"Video URL not set","videoId":"abc"}"#)
            .create_async()
            .await;

        let client = VideoAnalysisClient::new(server.url());
        let err = client.trigger("abc", "x.mp4", 10).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "Video URL not set");
    }

    #[tokio::test]
    async fn trigger_falls_back_when_error_body_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/functions/v1/analyze-video")
            .with_status(502)
            .create_async()
            .await;

        let client = VideoAnalysisClient::new(server.url());
        let err = client.trigger("abc", "x.mp4", 10).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to trigger analysis");
    }

    #[tokio::test]
    async fn send_chat_returns_response_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/functions/v1/ask-about-video")
            .match_body(mockito::Matcher::PartialJson(json!({
                "question": "Why?",
                "videoId": "abc"
            })))
            .with_status(200)
            .with_body(r#"{"success":true,"videoId":"abc","response":"Because."}"#)
            .create_async()
            .await;

        let client = VideoAnalysisClient::new(server.url());
        let answer = client.send_chat("abc", "Why?", None, &[]).await.unwrap();
        assert_eq!(answer, "Because.");
    }

    #[tokio::test]
    async fn create_without_session_is_rejected_locally() {
        let client = VideoAnalysisClient::new("http://127.0.0.1:9");
        let err = client.create("clip.mp4", 5_000_000, None).await.unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
        assert_eq!(err.to_string(), "No authenticated user");
    }
}
