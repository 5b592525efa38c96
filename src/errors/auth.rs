//! Authentication and authorisation error types

use thiserror::Error;

use super::CoreError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session expired")]
    SessionExpired,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

impl AuthError {
    pub fn http_status_code(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials
            | AuthError::SessionExpired
            | AuthError::AuthenticationRequired => 401,
            AuthError::AccountDeactivated | AuthError::PermissionDenied(_) => 403,
            AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) => 400,
            AuthError::UserAlreadyExists => 409,
            AuthError::Database(_) | AuthError::Hashing(_) => 500,
        }
    }
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::InvalidCredentials
            | AuthError::SessionExpired
            | AuthError::AuthenticationRequired => CoreError::unauthorized(message),
            AuthError::AccountDeactivated | AuthError::PermissionDenied(_) => {
                CoreError::forbidden(message)
            }
            AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) => {
                CoreError::validation(message)
            }
            AuthError::UserAlreadyExists => CoreError::conflict(message),
            AuthError::Database(db) => CoreError::database("authentication", db),
            AuthError::Hashing(e) => CoreError::internal(message).with_source(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreErrorKind;

    #[test]
    fn auth_errors_keep_their_status_class() {
        let cases = [
            (AuthError::InvalidCredentials, CoreErrorKind::Unauthorized),
            (AuthError::AuthenticationRequired, CoreErrorKind::Unauthorized),
            (
                AuthError::PermissionDenied("add team member".into()),
                CoreErrorKind::Forbidden,
            ),
            (
                AuthError::WeakPassword("too short".into()),
                CoreErrorKind::Validation,
            ),
            (AuthError::UserAlreadyExists, CoreErrorKind::Conflict),
        ];
        for (err, kind) in cases {
            let status = err.http_status_code();
            let core: CoreError = err.into();
            assert_eq!(core.kind(), kind);
            assert_eq!(core.kind().http_status_code(), status);
        }
    }
}
