use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info};

use super::{ChatPayload, TriggerPayload, Webhook, WorkflowEngine, WorkflowError};
use crate::config::WorkflowConfig;
use crate::http::interceptor::{NoopInterceptor, SharedInterceptor};

/// Posts JSON payloads to the configured n8n webhooks.
#[derive(Clone)]
pub struct N8nClient {
    http: reqwest::Client,
    config: WorkflowConfig,
    interceptor: SharedInterceptor,
}

impl N8nClient {
    pub fn new(config: WorkflowConfig) -> Result<Self, WorkflowError> {
        Self::with_interceptor(config, Arc::new(NoopInterceptor))
    }

    pub fn with_interceptor(
        config: WorkflowConfig,
        interceptor: SharedInterceptor,
    ) -> Result<Self, WorkflowError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
            interceptor,
        })
    }

    fn url(&self, webhook: Webhook) -> Option<&str> {
        match webhook {
            Webhook::Analyze => self.config.webhook_url.as_deref(),
            Webhook::Chat => self.config.chat_webhook_url.as_deref(),
        }
    }

    async fn post<T: Serialize>(&self, webhook: Webhook, payload: &T) -> Result<String, WorkflowError> {
        let url = self
            .url(webhook)
            .ok_or(WorkflowError::NotConfigured(webhook))?;
        let body = serde_json::to_value(payload)?;

        self.interceptor.before_request("POST", url, Some(&body));
        let started = Instant::now();

        let mut request = self.http.post(url).json(&body);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.interceptor
                    .after_response("POST", url, None, started.elapsed());
                error!("Request to {:?} webhook failed: {}", webhook, e);
                return Err(e.into());
            }
        };

        let status = response.status();
        self.interceptor
            .after_response("POST", url, Some(status.as_u16()), started.elapsed());
        let text = response.text().await?;

        if !status.is_success() {
            error!("{:?} webhook returned {}: {}", webhook, status, text);
            return Err(WorkflowError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!("{:?} webhook response: {}", webhook, text);
        Ok(text)
    }
}

#[async_trait]
impl WorkflowEngine for N8nClient {
    fn is_configured(&self, webhook: Webhook) -> bool {
        self.url(webhook).is_some()
    }

    async fn trigger_analysis(&self, payload: &TriggerPayload) -> Result<String, WorkflowError> {
        info!("Sending video {} to analysis webhook", payload.video_id);
        self.post(Webhook::Analyze, payload).await
    }

    async fn ask(&self, payload: &ChatPayload) -> Result<String, WorkflowError> {
        info!("Forwarding question about video {}", payload.video_id);
        self.post(Webhook::Chat, payload).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    fn trigger_payload() -> TriggerPayload {
        TriggerPayload {
            video_id: "abc".into(),
            video_url: "http://localhost:3000/storage/v1/object/public/videos/B3CG/abc.mp4".into(),
            file_name: "clip.mp4".into(),
            file_size: Some(5_000_000),
            callback_url: "http://localhost:3000/functions/v1/receive-analysis".into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn trigger_posts_payload_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/webhook/analyze")
            .match_header("authorization", "Bearer s3cret")
            .match_body(Matcher::PartialJson(json!({
                "videoId": "abc",
                "fileName": "clip.mp4",
                "fileSize": 5_000_000,
            })))
            .with_status(200)
            .with_body("queued")
            .create_async()
            .await;

        let client = N8nClient::new(WorkflowConfig {
            webhook_url: Some(format!("{}/webhook/analyze", server.url())),
            auth_token: Some("s3cret".into()),
            ..Default::default()
        })
        .unwrap();

        let body = client.trigger_analysis(&trigger_payload()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(body, "queued");
    }

    #[tokio::test]
    async fn non_success_status_is_rejected_with_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/webhook/chat")
            .with_status(500)
            .with_body("workflow crashed")
            .create_async()
            .await;

        let client = N8nClient::new(WorkflowConfig {
            chat_webhook_url: Some(format!("{}/webhook/chat", server.url())),
            ..Default::default()
        })
        .unwrap();

        let payload = ChatPayload {
            question: "Why?".into(),
            video_id: "abc".into(),
            analysis_data: json!({}),
            chat_history: json!([]),
            timestamp: Utc::now(),
        };
        let err = client.ask(&payload).await.unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(err.details(), "workflow crashed");
    }

    #[tokio::test]
    async fn missing_url_is_not_configured() {
        let client = N8nClient::new(WorkflowConfig {
            request_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        })
        .unwrap();
        assert!(!client.is_configured(Webhook::Analyze));
        let err = client.trigger_analysis(&trigger_payload()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotConfigured(Webhook::Analyze)));
    }

    #[tokio::test]
    async fn unencodable_payload_is_an_error_and_nothing_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/webhook/analyze")
            .expect(0)
            .create_async()
            .await;

        let client = N8nClient::new(WorkflowConfig {
            webhook_url: Some(format!("{}/webhook/analyze", server.url())),
            ..Default::default()
        })
        .unwrap();

        // JSON objects need string keys
        let payload: std::collections::HashMap<(u8, u8), u8> = [((1, 2), 3)].into_iter().collect();
        let err = client.post(Webhook::Analyze, &payload).await.unwrap_err();
        mock.assert_async().await;
        assert!(matches!(err, WorkflowError::Encode(_)));
        assert_eq!(err.status(), 0);
    }
}
