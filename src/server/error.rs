use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Map, Value};
use tracing::error;

use crate::errors::{CoreError, CoreErrorKind};

/// Renders as `{"error": message, ...fields}` with the kind's status code.
impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind().http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.kind() == CoreErrorKind::Internal {
            error!("{}: {:?}", self, std::error::Error::source(&self));
        }

        let mut body = Map::new();
        if let Some(fields) = self.fields() {
            for (key, value) in fields {
                body.insert(key.clone(), value.clone());
            }
        }
        body.insert("error".to_string(), Value::String(self.message().to_string()));

        (status, Json(Value::Object(body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fields_are_merged_into_body() {
        let response = CoreError::new(CoreErrorKind::NotFound, "Video not found")
            .with_field("videoId", "abc")
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"error": "Video not found", "videoId": "abc"}));
    }
}
