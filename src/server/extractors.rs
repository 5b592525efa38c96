use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

use super::app::AppState;
use crate::database::entities::users;
use crate::errors::CoreError;
use crate::services::AuthorizationService;

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The user owning the session named by the bearer token.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: users::Model,
    pub session_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session_id = bearer_token(&parts.headers)
            .ok_or_else(|| CoreError::unauthorized("No authenticated user"))?
            .to_string();

        let user = AuthorizationService::new(state.db.clone())
            .get_user_from_session(&session_id)
            .await?;

        Ok(CurrentUser { user, session_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3ss10n"));
        assert_eq!(bearer_token(&headers), Some("s3ss10n"));
    }
}
