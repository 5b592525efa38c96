//! Hooks around outbound HTTP calls.
//!
//! Clients take an interceptor at construction time, so monitoring is
//! switched on per client rather than for the whole process.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

pub trait RequestInterceptor: Send + Sync {
    fn before_request(&self, method: &str, url: &str, body: Option<&Value>);

    /// `status` is `None` when the request never produced a response.
    fn after_response(&self, method: &str, url: &str, status: Option<u16>, elapsed: Duration);
}

pub type SharedInterceptor = Arc<dyn RequestInterceptor>;

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopInterceptor;

impl RequestInterceptor for NoopInterceptor {
    fn before_request(&self, _method: &str, _url: &str, _body: Option<&Value>) {}

    fn after_response(&self, _method: &str, _url: &str, _status: Option<u16>, _elapsed: Duration) {}
}

/// Logs calls to the function endpoints and the workflow engine.
#[derive(Clone, Debug)]
pub struct LoggingInterceptor {
    patterns: Vec<String>,
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new(["/functions/", "n8n"])
    }
}

impl LoggingInterceptor {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|pattern| url.contains(pattern.as_str()))
    }
}

impl RequestInterceptor for LoggingInterceptor {
    fn before_request(&self, method: &str, url: &str, body: Option<&Value>) {
        if !self.matches(url) {
            return;
        }
        match body {
            Some(body) => info!(target: "bosroller::network", %method, %url, body = %body, "Outbound request"),
            None => info!(target: "bosroller::network", %method, %url, "Outbound request"),
        }
    }

    fn after_response(&self, method: &str, url: &str, status: Option<u16>, elapsed: Duration) {
        if !self.matches(url) {
            return;
        }
        info!(
            target: "bosroller::network",
            %method,
            %url,
            status = ?status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Response received"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patterns_cover_functions_and_workflow_hosts() {
        let interceptor = LoggingInterceptor::default();
        assert!(interceptor.matches("http://localhost:3000/functions/v1/analyze-video"));
        assert!(interceptor.matches("https://n8n.example.com/webhook/analyze"));
        assert!(!interceptor.matches("http://localhost:3000/api/v1/video-analyses"));
    }
}
