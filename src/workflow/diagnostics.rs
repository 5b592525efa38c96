//! Connectivity checks for the n8n webhooks, used by `bosroller diagnose`.

use std::fmt::Write;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::Webhook;
use crate::config::WorkflowConfig;

/// Header n8n's header-auth credential checks.
pub const SECRET_HEADER: &str = "X-N8N-AUTH";

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTestResult {
    pub url: String,
    pub method: String,
    /// 0 when no response arrived.
    pub status: u16,
    pub status_text: String,
    pub duration_ms: u128,
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub response_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentCheck {
    pub analyze_url_set: bool,
    pub chat_url_set: bool,
    pub secret_set: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct DiagnosticsReport {
    pub timestamp: DateTime<Utc>,
    pub environment: EnvironmentCheck,
    pub analyze: Option<WebhookTestResult>,
    pub chat: Option<WebhookTestResult>,
}

impl DiagnosticsReport {
    pub fn all_ok(&self) -> bool {
        [&self.analyze, &self.chat]
            .into_iter()
            .all(|result| matches!(result, Some(r) if r.success))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn render(&self) -> String {
        let mark = |set: bool| {
            if set {
                "set".green()
            } else {
                "not set".red()
            }
        };
        let mut out = String::new();
        let _ = writeln!(out, "{}", "Webhook configuration".bold());
        let _ = writeln!(out, "  Analyze URL: {}", mark(self.environment.analyze_url_set));
        let _ = writeln!(out, "  Chat URL:    {}", mark(self.environment.chat_url_set));
        let _ = writeln!(out, "  Secret:      {}", mark(self.environment.secret_set));

        for (label, result) in [("Analyze webhook", &self.analyze), ("Chat webhook", &self.chat)] {
            let _ = writeln!(out, "{}", label.bold());
            match result {
                None => {
                    let _ = writeln!(out, "  skipped (URL not set)");
                }
                Some(result) => {
                    let status = format!("{} {}", result.status, result.status_text);
                    let status = if result.success { status.green() } else { status.red() };
                    let _ = writeln!(out, "  Status:   {}", status);
                    let _ = writeln!(out, "  Duration: {}ms", result.duration_ms);
                    if let Some(error) = &result.error {
                        let _ = writeln!(out, "  Error:    {}", error);
                    }
                    if !result.response_body.is_empty() {
                        let _ = writeln!(out, "  Response: {}", result.response_body);
                    }
                }
            }
        }

        if self.all_ok() {
            let _ = writeln!(out, "{}", "All webhooks responding correctly".green().bold());
        } else {
            let _ = writeln!(
                out,
                "{}",
                "Some webhooks are not responding. Check configuration.".yellow().bold()
            );
        }
        out
    }
}

/// Posts a test payload to `url`, merging `overrides` over the defaults.
pub async fn test_webhook(
    http: &reqwest::Client,
    url: &str,
    secret: Option<&str>,
    overrides: Value,
) -> WebhookTestResult {
    let mut payload = Map::new();
    payload.insert("videoId".into(), json!(format!("test-{}", Utc::now().timestamp_millis())));
    payload.insert("fileName".into(), json!("test-video.mp4"));
    payload.insert("fileSize".into(), json!(1_000_000));
    payload.insert("timestamp".into(), json!(Utc::now()));
    if let Value::Object(extra) = overrides {
        payload.extend(extra);
    }

    info!("Testing webhook {}", url);
    let mut request = http.post(url).json(&payload);
    if let Some(secret) = secret {
        request = request.header(SECRET_HEADER, secret);
    }

    let started = Instant::now();
    match request.send().await {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            WebhookTestResult {
                url: url.to_string(),
                method: "POST".to_string(),
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                duration_ms: started.elapsed().as_millis(),
                success: status.is_success(),
                response_body: body,
                error: None,
            }
        }
        Err(e) => {
            warn!("Webhook {} unreachable: {}", url, e);
            WebhookTestResult {
                url: url.to_string(),
                method: "POST".to_string(),
                status: 0,
                status_text: "Network Error".to_string(),
                duration_ms: started.elapsed().as_millis(),
                success: false,
                response_body: String::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Checks which webhook settings are present, then exercises each
/// configured webhook once.
pub async fn run_diagnostics(config: &WorkflowConfig, timeout: Duration) -> DiagnosticsReport {
    let environment = EnvironmentCheck {
        analyze_url_set: config.webhook_url.is_some(),
        chat_url_set: config.chat_webhook_url.is_some(),
        secret_set: config.auth_token.is_some(),
    };
    for (set, key) in [
        (environment.analyze_url_set, Webhook::Analyze.env_key()),
        (environment.chat_url_set, Webhook::Chat.env_key()),
        (environment.secret_set, "N8N_WEBHOOK_AUTH"),
    ] {
        if !set {
            warn!("{} not configured. Update .env with the value", key);
        }
    }

    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default();
    let secret = config.auth_token.as_deref();
    let stamp = Utc::now().timestamp_millis();

    let analyze = match &config.webhook_url {
        Some(url) => Some(
            test_webhook(
                &http,
                url,
                secret,
                json!({
                    "videoId": format!("diagnostic-{}", stamp),
                    "fileName": "diagnostic-video.mp4",
                    "fileSize": 5_242_880,
                }),
            )
            .await,
        ),
        None => None,
    };
    let chat = match &config.chat_webhook_url {
        Some(url) => Some(
            test_webhook(
                &http,
                url,
                secret,
                json!({
                    "videoId": format!("diagnostic-{}", stamp),
                    "question": "Is this a diagnostic test?",
                    "analysisData": {},
                    "chatHistory": [],
                }),
            )
            .await,
        ),
        None => None,
    };

    DiagnosticsReport {
        timestamp: Utc::now(),
        environment,
        analyze,
        chat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn sends_secret_header_and_merged_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/webhook/analyze")
            .match_header(SECRET_HEADER, "s3cret")
            .match_body(Matcher::PartialJson(json!({
                "fileName": "diagnostic-video.mp4",
                "fileSize": 5_242_880
            })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let config = WorkflowConfig {
            webhook_url: Some(format!("{}/webhook/analyze", server.url())),
            auth_token: Some("s3cret".to_string()),
            ..Default::default()
        };
        let report = run_diagnostics(&config, Duration::from_secs(5)).await;

        mock.assert_async().await;
        let analyze = report.analyze.as_ref().unwrap();
        assert!(analyze.success);
        assert_eq!(analyze.status, 200);
        assert!(report.chat.is_none());
        assert!(!report.all_ok());
        assert!(!report.environment.chat_url_set);
    }

    #[tokio::test]
    async fn unreachable_webhook_reports_network_error() {
        let http = reqwest::Client::new();
        let result = test_webhook(&http, "http://127.0.0.1:9/hook", None, json!({})).await;

        assert_eq!(result.status, 0);
        assert_eq!(result.status_text, "Network Error");
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[test]
    fn export_omits_empty_fields() {
        let report = DiagnosticsReport {
            timestamp: Utc::now(),
            environment: EnvironmentCheck {
                analyze_url_set: false,
                chat_url_set: false,
                secret_set: false,
            },
            analyze: None,
            chat: None,
        };
        let exported: Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(exported["environment"]["secretSet"], json!(false));
        assert!(exported["analyze"].is_null());
    }
}
