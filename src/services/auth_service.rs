use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::info;
use uuid::Uuid;

use crate::database::entities::{user_sessions, users};
use crate::errors::{AuthError, AuthResult};

const MIN_PASSWORD_LENGTH: usize = 8;

/// Service for handling authentication operations
#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
}

impl AuthService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Hash a password using bcrypt
    pub fn hash_password(password: &str) -> AuthResult<String> {
        if password.is_empty() {
            return Err(AuthError::WeakPassword("Password cannot be empty".into()));
        }

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }

        Ok(hash(password, DEFAULT_COST)?)
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
        Ok(verify(password, hash)?)
    }

    pub fn generate_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn is_session_expired(expires_at: chrono::DateTime<Utc>) -> bool {
        Utc::now() > expires_at
    }

    /// Validate email format
    pub fn validate_email(email: &str) -> AuthResult<()> {
        let invalid = |reason: &str| Err(AuthError::InvalidEmail(reason.to_string()));

        if email.is_empty() {
            return invalid("Email cannot be empty");
        }

        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 {
            return invalid("must contain exactly one @");
        }

        let (local_part, domain_part) = (parts[0], parts[1]);
        if local_part.is_empty() {
            return invalid("local part cannot be empty");
        }
        if domain_part.is_empty() || !domain_part.contains('.') {
            return invalid("domain must contain a dot");
        }
        if domain_part.starts_with('.') || domain_part.ends_with('.') {
            return invalid("domain cannot start or end with a dot");
        }
        if email.len() > 254 {
            return invalid("Email is too long");
        }

        Ok(())
    }

    /// Creates an active login. Emails are stored lower-cased.
    pub async fn register(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
    ) -> AuthResult<users::Model> {
        let email = email.trim().to_lowercase();
        Self::validate_email(&email)?;
        let password_hash = Self::hash_password(password)?;

        let existing = users::Entity::find()
            .filter(users::Column::Email.eq(&email))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let display_name = match display_name.trim() {
            "" => email.split('@').next().unwrap_or_default().to_string(),
            name => name.to_string(),
        };

        let user = users::ActiveModel::new(email, display_name, password_hash)
            .insert(&self.db)
            .await?;
        info!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    /// Checks credentials and opens a 24 hour session.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<(users::Model, user_sessions::Model)> {
        let email = email.trim().to_lowercase();
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(&email))
            .one(&self.db)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !Self::verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        let session = user_sessions::ActiveModel::new(user.id, Self::generate_session_id())
            .insert(&self.db)
            .await?;

        let mut active: users::ActiveModel = user.into();
        active.last_login_at = Set(Some(Utc::now()));
        let user = active.update(&self.db).await?;

        info!("User {} logged in", user.id);
        Ok((user, session))
    }

    pub async fn logout(&self, session_id: &str) -> AuthResult<()> {
        let session = user_sessions::Entity::find()
            .filter(user_sessions::Column::SessionId.eq(session_id))
            .one(&self.db)
            .await?;

        if let Some(session) = session {
            let mut active: user_sessions::ActiveModel = session.into();
            active.is_active = Set(false);
            active.update(&self.db).await?;
        }
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(AuthError::AuthenticationRequired)?;

        if !Self::verify_password(current_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        let password_hash = Self::hash_password(new_password)?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;
        Ok(())
    }
}
