use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryOrder, Set};
use serde::Deserialize;
use tracing::info;

use crate::database::entities::{team_members, TeamRole};
use crate::errors::{CoreError, CoreResult};
use crate::services::auth_service::AuthService;

#[derive(Clone, Debug, Deserialize)]
pub struct NewTeamMember {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: TeamRole,
}

/// The studio roster. Every member has a login of their own.
#[derive(Clone)]
pub struct TeamService {
    db: DatabaseConnection,
}

impl TeamService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Newest first.
    pub async fn list(&self) -> CoreResult<Vec<team_members::Model>> {
        team_members::Entity::find()
            .order_by_desc(team_members::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::database("listing team members", e))
    }

    /// Creates the login and the roster entry. Callers check the admin role.
    pub async fn add_member(&self, member: NewTeamMember) -> CoreResult<team_members::Model> {
        let name = member.name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("Name is required"));
        }

        let user = AuthService::new(self.db.clone())
            .register(&member.email, name, &member.password)
            .await?;

        let created = team_members::ActiveModel {
            user_id: Set(user.id),
            name: Set(name.to_string()),
            email: Set(user.email.clone()),
            role: Set(member.role.as_str().to_string()),
            avatar: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| CoreError::database("adding team member", e))?;

        info!("Added {} to the team as {}", created.email, created.role);
        Ok(created)
    }

    pub async fn delete_member(&self, id: i32) -> CoreResult<()> {
        let member = team_members::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("loading team member", e))?
            .ok_or_else(|| CoreError::not_found("TeamMember", id.to_string()))?;

        member
            .delete(&self.db)
            .await
            .map_err(|e| CoreError::database("deleting team member", e))?;
        info!("Removed team member {}", id);
        Ok(())
    }
}
