//! Maps failures from backend services to user-facing categories.
//!
//! A [`FormattedError`] keeps the message shown to a user apart from the
//! technical detail, which only goes to the log via [`log_error`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    AuthenticationError,
    PermissionError,
    NotFoundError,
    RateLimitError,
    UpstreamServerError,
    NetworkError,
    ValidationError,
    UnknownError,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::AuthenticationError => "AUTHENTICATION_ERROR",
            ErrorCategory::PermissionError => "PERMISSION_ERROR",
            ErrorCategory::NotFoundError => "NOT_FOUND_ERROR",
            ErrorCategory::RateLimitError => "RATE_LIMIT_ERROR",
            ErrorCategory::UpstreamServerError => "UPSTREAM_SERVER_ERROR",
            ErrorCategory::NetworkError => "NETWORK_ERROR",
            ErrorCategory::ValidationError => "VALIDATION_ERROR",
            ErrorCategory::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

/// The raw facts known about a failed call.
#[derive(Debug, Clone, Default)]
pub struct Failure {
    pub status: Option<u16>,
    /// Transport level code such as `ENOTFOUND` or `ECONNREFUSED`.
    pub network_code: Option<String>,
    pub message: String,
}

impl Failure {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            network_code: None,
            message: message.into(),
        }
    }

    pub fn network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: None,
            network_code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::status(status.as_u16(), err.to_string());
        }
        if err.is_connect() {
            return Self::network("ECONNREFUSED", err.to_string());
        }
        if err.is_timeout() {
            return Self::network("ETIMEDOUT", err.to_string());
        }
        Self::other(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedError {
    pub timestamp: DateTime<Utc>,
    pub context: String,
    pub status_code: Option<u16>,
    pub error_type: ErrorCategory,
    pub user_message: String,
    pub technical_message: String,
    pub suggestion: String,
}

pub fn categorize(failure: &Failure) -> ErrorCategory {
    match failure.status {
        Some(401) => ErrorCategory::AuthenticationError,
        Some(403) => ErrorCategory::PermissionError,
        Some(404) => ErrorCategory::NotFoundError,
        Some(429) => ErrorCategory::RateLimitError,
        Some(400) | Some(422) => ErrorCategory::ValidationError,
        Some(status) if status >= 500 => ErrorCategory::UpstreamServerError,
        _ => match failure.network_code.as_deref() {
            Some("ENOTFOUND") | Some("ECONNREFUSED") | Some("ETIMEDOUT") => {
                ErrorCategory::NetworkError
            }
            _ => ErrorCategory::UnknownError,
        },
    }
}

/// Formats a failure of a call against `service` (e.g. "Google Drive").
pub fn format_error(service: &str, failure: &Failure, context: &str) -> FormattedError {
    let category = categorize(failure);
    let (user_message, technical_message, suggestion) = match category {
        ErrorCategory::AuthenticationError => (
            format!("Authentication failed with {}", service),
            "Invalid or expired credentials".to_string(),
            format!("Check the credentials configured for {}", service),
        ),
        ErrorCategory::PermissionError => (
            format!("Access denied by {}", service),
            failure.message.clone(),
            format!(
                "Grant the configured account the required role in {}",
                service
            ),
        ),
        ErrorCategory::NotFoundError => (
            format!("Resource not found in {}", service),
            failure.message.clone(),
            "Check that the identifier is correct and the resource still exists".to_string(),
        ),
        ErrorCategory::RateLimitError => (
            format!("Too many requests to {}", service),
            "API rate limit exceeded".to_string(),
            "Please wait a few moments and try again".to_string(),
        ),
        ErrorCategory::UpstreamServerError => (
            format!("{} is temporarily unavailable", service),
            failure.message.clone(),
            "Try again in a few moments".to_string(),
        ),
        ErrorCategory::NetworkError => (
            format!("Failed to connect to {}", service),
            format!(
                "Network error: {}",
                failure.network_code.as_deref().unwrap_or("unknown")
            ),
            format!(
                "Check your internet connection and verify {} is reachable",
                service
            ),
        ),
        ErrorCategory::ValidationError => (
            format!("{} rejected the request as invalid", service),
            failure.message.clone(),
            "Check the request payload and required fields".to_string(),
        ),
        ErrorCategory::UnknownError => (
            format!("An error occurred while accessing {}", service),
            failure.message.clone(),
            "Check the server logs for more details".to_string(),
        ),
    };

    FormattedError {
        timestamp: Utc::now(),
        context: context.to_string(),
        status_code: failure.status,
        error_type: category,
        user_message,
        technical_message,
        suggestion,
    }
}

/// Formats and logs a failure, returning the formatted record.
pub fn log_error(
    service: &str,
    failure: &Failure,
    context: &str,
    additional: Option<&Value>,
) -> FormattedError {
    let formatted = format_error(service, failure, context);
    tracing::error!(
        service,
        context = %formatted.context,
        error_type = formatted.error_type.as_str(),
        status_code = ?formatted.status_code,
        technical = %formatted.technical_message,
        suggestion = %formatted.suggestion,
        additional = ?additional,
        "{}",
        formatted.user_message
    );
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_categories() {
        let cases = [
            (401, ErrorCategory::AuthenticationError),
            (403, ErrorCategory::PermissionError),
            (404, ErrorCategory::NotFoundError),
            (429, ErrorCategory::RateLimitError),
            (400, ErrorCategory::ValidationError),
            (500, ErrorCategory::UpstreamServerError),
            (503, ErrorCategory::UpstreamServerError),
            (418, ErrorCategory::UnknownError),
        ];
        for (status, expected) in cases {
            assert_eq!(categorize(&Failure::status(status, "x")), expected, "{}", status);
        }
    }

    #[test]
    fn network_codes_map_to_network_error() {
        let formatted = format_error(
            "Google Drive",
            &Failure::network("ENOTFOUND", "dns failure"),
            "list files",
        );
        assert_eq!(formatted.error_type, ErrorCategory::NetworkError);
        assert_eq!(formatted.technical_message, "Network error: ENOTFOUND");
        assert_eq!(formatted.status_code, None);
    }

    #[test]
    fn technical_detail_stays_out_of_user_message() {
        let formatted = format_error(
            "n8n",
            &Failure::status(502, "upstream stack trace"),
            "trigger",
        );
        assert!(!formatted.user_message.contains("stack trace"));
        assert_eq!(formatted.technical_message, "upstream stack trace");
        assert_eq!(formatted.context, "trigger");
    }

    #[test]
    fn category_serializes_screaming_snake_case() {
        let value = serde_json::to_value(ErrorCategory::RateLimitError).unwrap();
        assert_eq!(value, Value::from("RATE_LIMIT_ERROR"));
    }
}
