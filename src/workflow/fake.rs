use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{ChatPayload, TriggerPayload, Webhook, WorkflowEngine, WorkflowError};

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCall {
    Trigger(Value),
    Chat(Value),
}

/// In-memory [`WorkflowEngine`] that records payloads and replays queued
/// replies. With an empty queue every call succeeds with `{"ok":true}`.
#[derive(Clone)]
pub struct FakeWorkflowEngine {
    configured: bool,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    replies: Arc<Mutex<VecDeque<Result<String, (u16, String)>>>>,
}

impl Default for FakeWorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeWorkflowEngine {
    pub fn new() -> Self {
        Self {
            configured: true,
            calls: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn reply_with(&self, body: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Ok(body.into()));
        }
    }

    pub fn fail_with(&self, status: u16, body: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err((status, body.into())));
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn respond(&self, webhook: Webhook, call: RecordedCall) -> Result<String, WorkflowError> {
        if !self.configured {
            return Err(WorkflowError::NotConfigured(webhook));
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());
        match next {
            Some(Ok(body)) => Ok(body),
            Some(Err((status, body))) => Err(WorkflowError::Rejected { status, body }),
            None => Ok(r#"{"ok":true}"#.to_string()),
        }
    }
}

#[async_trait]
impl WorkflowEngine for FakeWorkflowEngine {
    fn is_configured(&self, _webhook: Webhook) -> bool {
        self.configured
    }

    async fn trigger_analysis(&self, payload: &TriggerPayload) -> Result<String, WorkflowError> {
        let value = serde_json::to_value(payload)?;
        self.respond(Webhook::Analyze, RecordedCall::Trigger(value))
    }

    async fn ask(&self, payload: &ChatPayload) -> Result<String, WorkflowError> {
        let value = serde_json::to_value(payload)?;
        self.respond(Webhook::Chat, RecordedCall::Chat(value))
    }
}
