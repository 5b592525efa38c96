//! Error types shared across the service.
//!
//! - **CoreError**: service and handler results, carries an HTTP status class
//! - **AuthError**: authentication and authorisation failures
//! - **formatter**: maps backend failures to user-facing categories and suggestions

pub mod auth;
pub mod core_error;
pub mod formatter;

pub use auth::AuthError;
pub use core_error::{CoreError, CoreErrorKind};
pub use formatter::{ErrorCategory, Failure, FormattedError};

/// Result type alias for service operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
