use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use serde_json::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoreErrorKind {
    NotFound,
    Validation,
    Conflict,
    Forbidden,
    Unauthorized,
    MethodNotAllowed,
    Upstream,
    Unavailable,
    Internal,
}

impl CoreErrorKind {
    pub fn http_status_code(&self) -> u16 {
        match self {
            CoreErrorKind::Validation => 400,
            CoreErrorKind::Unauthorized => 401,
            CoreErrorKind::Forbidden => 403,
            CoreErrorKind::NotFound => 404,
            CoreErrorKind::MethodNotAllowed => 405,
            CoreErrorKind::Conflict => 409,
            CoreErrorKind::Internal => 500,
            CoreErrorKind::Upstream => 502,
            CoreErrorKind::Unavailable => 503,
        }
    }
}

/// Error returned by services and handlers.
///
/// `message` is what ends up in the `error` field of a JSON response; `fields`
/// are merged into the same body, so they must not use the `error` key.
#[derive(Debug)]
pub struct CoreError {
    kind: CoreErrorKind,
    message: String,
    fields: Option<BTreeMap<String, Value>>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: None,
            source: None,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("entity".to_string(), Value::String(entity.into()));
        fields.insert("id".to_string(), Value::String(id.into()));

        Self {
            kind: CoreErrorKind::NotFound,
            message: "Resource not found".to_string(),
            fields: Some(fields),
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Validation, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Conflict, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Forbidden, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unauthorized, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(CoreErrorKind::MethodNotAllowed, "Method not allowed")
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Upstream, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message)
    }

    pub fn database(operation: &str, err: sea_orm::DbErr) -> Self {
        Self::internal(format!("Database error during {}", operation))
            .with_field("details", err.to_string())
            .with_source(err)
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, Value>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> CoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, Value>> {
        self.fields.as_ref()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::internal("Unhandled error").with_field("details", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_entity_and_id() {
        let err = CoreError::not_found("VideoAnalysis", "abc");
        assert_eq!(err.kind(), CoreErrorKind::NotFound);
        let fields = err.fields().unwrap();
        assert_eq!(fields["entity"], Value::from("VideoAnalysis"));
        assert_eq!(fields["id"], Value::from("abc"));
    }

    #[test]
    fn with_field_accumulates() {
        let err = CoreError::upstream("Failed to send to N8N")
            .with_field("status", 503)
            .with_field("details", "down");
        let fields = err.fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["status"], Value::from(503));
    }

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(CoreErrorKind::Validation.http_status_code(), 400);
        assert_eq!(CoreErrorKind::NotFound.http_status_code(), 404);
        assert_eq!(CoreErrorKind::MethodNotAllowed.http_status_code(), 405);
        assert_eq!(CoreErrorKind::Internal.http_status_code(), 500);
        assert_eq!(CoreErrorKind::Upstream.http_status_code(), 502);
    }
}
