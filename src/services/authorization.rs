use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::database::entities::{team_members, user_sessions, users, TeamRole};
use crate::errors::{CoreError, CoreResult};

/// Resolves sessions to users and checks team roles.
#[derive(Clone, Debug)]
pub struct AuthorizationService {
    db: DatabaseConnection,
}

impl AuthorizationService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get user from session ID
    pub async fn get_user_from_session(&self, session_id: &str) -> CoreResult<users::Model> {
        let session = user_sessions::Entity::find()
            .filter(user_sessions::Column::SessionId.eq(session_id))
            .filter(user_sessions::Column::IsActive.eq(true))
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("session lookup", e))?;

        let session =
            session.ok_or_else(|| CoreError::unauthorized("Invalid or expired session"))?;

        if session.expires_at <= Utc::now() {
            return Err(CoreError::unauthorized("Session expired"));
        }

        let user = users::Entity::find_by_id(session.user_id)
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("user lookup", e))?
            .ok_or_else(|| CoreError::unauthorized("Invalid or expired session"))?;

        if !user.is_active {
            return Err(CoreError::forbidden("Account is deactivated"));
        }

        Ok(user)
    }

    /// The caller's roster entry, if they have one.
    pub async fn team_membership(&self, user_id: i32) -> CoreResult<Option<team_members::Model>> {
        team_members::Entity::find()
            .filter(team_members::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("team member lookup", e))
    }

    /// Role checks always read the roster; a role claimed by the client is never used.
    pub async fn require_team_admin(&self, user_id: i32) -> CoreResult<team_members::Model> {
        let member = self
            .team_membership(user_id)
            .await?
            .ok_or_else(|| CoreError::forbidden("Only admins can manage team members"))?;

        match member.team_role()? {
            TeamRole::Admin => Ok(member),
            _ => Err(CoreError::forbidden("Only admins can manage team members")),
        }
    }
}
