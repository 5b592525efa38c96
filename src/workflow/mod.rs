//! Outbound calls to the n8n workflow engine.

pub mod diagnostics;
mod fake;
mod n8n;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::errors::Failure;

pub use fake::{FakeWorkflowEngine, RecordedCall};
pub use n8n::N8nClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Webhook {
    Analyze,
    Chat,
}

impl Webhook {
    pub fn env_key(&self) -> &'static str {
        match self {
            Webhook::Analyze => "N8N_WEBHOOK_URL",
            Webhook::Chat => "N8N_CHAT_WEBHOOK_URL",
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{} is not configured", .0.env_key())]
    NotConfigured(Webhook),

    #[error("Workflow engine responded with status {status}")]
    Rejected { status: u16, body: String },

    #[error("Workflow engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to encode workflow payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Status to report back to the caller; 0 when no response arrived.
    pub fn status(&self) -> u16 {
        match self {
            WorkflowError::Rejected { status, .. } => *status,
            WorkflowError::Transport(e) => e.status().map(|s| s.as_u16()).unwrap_or(0),
            WorkflowError::NotConfigured(_) | WorkflowError::Encode(_) => 0,
        }
    }

    pub fn details(&self) -> String {
        match self {
            WorkflowError::Rejected { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }

    pub fn to_failure(&self) -> Failure {
        match self {
            WorkflowError::Rejected { status, body } => Failure::status(*status, body.clone()),
            WorkflowError::Transport(e) => Failure::from_reqwest(e),
            WorkflowError::NotConfigured(_) | WorkflowError::Encode(_) => {
                Failure::other(self.to_string())
            }
        }
    }
}

/// Sent to the analysis webhook. The engine reports back via `callback_url`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerPayload {
    pub video_id: String,
    pub video_url: String,
    pub file_name: String,
    pub file_size: Option<i64>,
    pub callback_url: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub question: String,
    pub video_id: String,
    pub analysis_data: Value,
    pub chat_history: Value,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    fn is_configured(&self, webhook: Webhook) -> bool;

    /// Queues an analysis; returns the raw acknowledgement body.
    async fn trigger_analysis(&self, payload: &TriggerPayload) -> Result<String, WorkflowError>;

    /// Forwards a question; returns the raw response body.
    async fn ask(&self, payload: &ChatPayload) -> Result<String, WorkflowError>;
}

/// The `response` field of a chat reply, the whole JSON document when that
/// field is missing or empty, or the raw text when the body is not JSON.
pub fn extract_chat_response(body: &str) -> Value {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => match json.get("response") {
            Some(response) if is_truthy(response) => response.clone(),
            _ => json,
        },
        Err(_) => Value::String(body.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_response_prefers_response_field() {
        assert_eq!(
            extract_chat_response(r#"{"response":"Cut the intro"}"#),
            json!("Cut the intro")
        );
        assert_eq!(
            extract_chat_response(r#"{"answer":"x"}"#),
            json!({"answer": "x"})
        );
        assert_eq!(
            extract_chat_response(r#"{"response":""}"#),
            json!({"response": ""})
        );
        assert_eq!(extract_chat_response("plain text"), json!("plain text"));
    }

    #[test]
    fn trigger_payload_uses_camel_case() {
        let payload = TriggerPayload {
            video_id: "abc".into(),
            video_url: "http://x/abc.mp4".into(),
            file_name: "clip.mp4".into(),
            file_size: Some(5_000_000),
            callback_url: "http://x/functions/v1/receive-analysis".into(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["videoId"], "abc");
        assert_eq!(value["videoUrl"], "http://x/abc.mp4");
        assert_eq!(value["fileSize"], 5_000_000);
        assert!(value["callbackUrl"].is_string());
        assert!(value["timestamp"].is_string());
    }
}
