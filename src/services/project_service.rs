use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::entities::{
    comments, materials, project_team_members, projects, team_members, ProjectStatus, ScriptLine,
};
use crate::errors::{CoreError, CoreResult};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MaterialInput {
    pub name: String,
    #[serde(default)]
    pub checked: bool,
}

/// Fields of the project form. `team_member_ids` and `materials` replace the
/// current assignments when present and leave them alone when absent.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProjectInput {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub location: Option<String>,
    pub shoot_date: Option<String>,
    pub shoot_time: Option<String>,
    pub notes: Option<String>,
    pub script: Option<Vec<ScriptLine>>,
    pub posted_by_member_id: Option<i32>,
    pub team_member_ids: Option<Vec<i32>>,
    pub materials: Option<Vec<MaterialInput>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: projects::Model,
    pub team_members: Vec<team_members::Model>,
    pub materials: Vec<materials::Model>,
    pub comments: Vec<comments::Model>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoardColumn {
    pub status: ProjectStatus,
    pub projects: Vec<projects::Model>,
}

/// Kanban projects with their materials, comments and team assignments.
#[derive(Clone)]
pub struct ProjectService {
    db: DatabaseConnection,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ProjectService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> CoreResult<Vec<projects::Model>> {
        projects::Entity::find()
            .order_by_desc(projects::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::database("listing projects", e))
    }

    /// One column per status, in board order; empty columns included.
    pub async fn board(&self) -> CoreResult<Vec<BoardColumn>> {
        let all = self.list().await?;
        Ok(ProjectStatus::ALL
            .into_iter()
            .map(|status| BoardColumn {
                status,
                projects: all
                    .iter()
                    .filter(|p| p.status == status.as_str())
                    .cloned()
                    .collect(),
            })
            .collect())
    }

    async fn find(&self, id: i32) -> CoreResult<projects::Model> {
        projects::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("loading project", e))?
            .ok_or_else(|| CoreError::not_found("Project", id.to_string()))
    }

    pub async fn get_detail(&self, id: i32) -> CoreResult<ProjectDetail> {
        let project = self.find(id).await?;

        let team_members = project
            .find_related(project_team_members::Entity)
            .find_also_related(team_members::Entity)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::database("loading project team", e))?
            .into_iter()
            .filter_map(|(_, member)| member)
            .collect();

        let materials = project
            .find_related(materials::Entity)
            .order_by_asc(materials::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::database("loading materials", e))?;

        let comments = self.list_comments(id).await?;

        Ok(ProjectDetail {
            project,
            team_members,
            materials,
            comments,
        })
    }

    fn validate(input: &ProjectInput) -> CoreResult<()> {
        if input.title.trim().is_empty() {
            return Err(CoreError::validation("Project title is required"));
        }
        if let Some(materials) = &input.materials {
            if materials.iter().any(|m| m.name.trim().is_empty()) {
                return Err(CoreError::validation("Material names cannot be empty"));
            }
        }
        Ok(())
    }

    fn encode_script(script: Option<&Vec<ScriptLine>>) -> CoreResult<serde_json::Value> {
        serde_json::to_value(script.cloned().unwrap_or_default())
            .map_err(|e| CoreError::internal("Failed to encode script").with_source(e))
    }

    pub async fn create(&self, user_id: i32, input: ProjectInput) -> CoreResult<ProjectDetail> {
        Self::validate(&input)?;
        let now = Utc::now();
        let script = Self::encode_script(input.script.as_ref())?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::database("starting transaction", e))?;

        let project = projects::ActiveModel {
            user_id: Set(user_id),
            title: Set(input.title.trim().to_string()),
            description: Set(blank_to_none(input.description)),
            status: Set(input.status.unwrap_or(ProjectStatus::Ideas).as_str().to_string()),
            location: Set(blank_to_none(input.location)),
            shoot_date: Set(blank_to_none(input.shoot_date)),
            shoot_time: Set(blank_to_none(input.shoot_time)),
            notes: Set(blank_to_none(input.notes)),
            script: Set(script),
            posted_by_member_id: Set(input.posted_by_member_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| CoreError::database("creating project", e))?;

        if let Some(ids) = &input.team_member_ids {
            Self::replace_team(&txn, project.id, ids).await?;
        }
        if let Some(materials) = &input.materials {
            Self::replace_materials(&txn, project.id, materials).await?;
        }

        txn.commit()
            .await
            .map_err(|e| CoreError::database("committing project", e))?;

        info!("Created project {} '{}'", project.id, project.title);
        self.get_detail(project.id).await
    }

    pub async fn update(&self, id: i32, input: ProjectInput) -> CoreResult<ProjectDetail> {
        Self::validate(&input)?;
        let existing = self.find(id).await?;
        let script = Self::encode_script(input.script.as_ref())?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::database("starting transaction", e))?;

        let mut active: projects::ActiveModel = existing.into();
        active.title = Set(input.title.trim().to_string());
        active.description = Set(blank_to_none(input.description));
        if let Some(status) = input.status {
            active.status = Set(status.as_str().to_string());
        }
        active.location = Set(blank_to_none(input.location));
        active.shoot_date = Set(blank_to_none(input.shoot_date));
        active.shoot_time = Set(blank_to_none(input.shoot_time));
        active.notes = Set(blank_to_none(input.notes));
        active.script = Set(script);
        active.posted_by_member_id = Set(input.posted_by_member_id);
        active.updated_at = Set(Utc::now());
        active
            .update(&txn)
            .await
            .map_err(|e| CoreError::database("updating project", e))?;

        if let Some(ids) = &input.team_member_ids {
            Self::replace_team(&txn, id, ids).await?;
        }
        if let Some(materials) = &input.materials {
            Self::replace_materials(&txn, id, materials).await?;
        }

        txn.commit()
            .await
            .map_err(|e| CoreError::database("committing project", e))?;

        self.get_detail(id).await
    }

    async fn replace_team<C: ConnectionTrait>(
        conn: &C,
        project_id: i32,
        member_ids: &[i32],
    ) -> CoreResult<()> {
        project_team_members::Entity::delete_many()
            .filter(project_team_members::Column::ProjectId.eq(project_id))
            .exec(conn)
            .await
            .map_err(|e| CoreError::database("clearing project team", e))?;

        let mut seen = std::collections::BTreeSet::new();
        for member_id in member_ids.iter().copied().filter(|id| seen.insert(*id)) {
            project_team_members::ActiveModel {
                project_id: Set(project_id),
                team_member_id: Set(member_id),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(conn)
            .await
            .map_err(|e| {
                CoreError::validation(format!("Unknown team member {}", member_id)).with_source(e)
            })?;
        }
        Ok(())
    }

    async fn replace_materials<C: ConnectionTrait>(
        conn: &C,
        project_id: i32,
        materials: &[MaterialInput],
    ) -> CoreResult<()> {
        materials::Entity::delete_many()
            .filter(materials::Column::ProjectId.eq(project_id))
            .exec(conn)
            .await
            .map_err(|e| CoreError::database("clearing materials", e))?;

        for material in materials {
            materials::ActiveModel {
                project_id: Set(project_id),
                name: Set(material.name.trim().to_string()),
                checked: Set(material.checked),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(conn)
            .await
            .map_err(|e| CoreError::database("adding material", e))?;
        }
        Ok(())
    }

    pub async fn set_status(&self, id: i32, status: ProjectStatus) -> CoreResult<projects::Model> {
        let project = self.find(id).await?;
        let mut active: projects::ActiveModel = project.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now());
        active
            .update(&self.db)
            .await
            .map_err(|e| CoreError::database("changing project status", e))
    }

    pub async fn delete(&self, id: i32) -> CoreResult<()> {
        let project = self.find(id).await?;
        project
            .delete(&self.db)
            .await
            .map_err(|e| CoreError::database("deleting project", e))?;
        info!("Deleted project {}", id);
        Ok(())
    }

    pub async fn add_material(&self, project_id: i32, name: &str) -> CoreResult<materials::Model> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("Material name is required"));
        }
        self.find(project_id).await?;

        materials::ActiveModel {
            project_id: Set(project_id),
            name: Set(name.to_string()),
            checked: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| CoreError::database("adding material", e))
    }

    async fn find_material(&self, project_id: i32, material_id: i32) -> CoreResult<materials::Model> {
        materials::Entity::find_by_id(material_id)
            .filter(materials::Column::ProjectId.eq(project_id))
            .one(&self.db)
            .await
            .map_err(|e| CoreError::database("loading material", e))?
            .ok_or_else(|| CoreError::not_found("Material", material_id.to_string()))
    }

    /// Flips the checked flag.
    pub async fn toggle_material(&self, project_id: i32, material_id: i32) -> CoreResult<materials::Model> {
        let material = self.find_material(project_id, material_id).await?;
        let checked = material.checked;
        let mut active: materials::ActiveModel = material.into();
        active.checked = Set(!checked);
        active
            .update(&self.db)
            .await
            .map_err(|e| CoreError::database("updating material", e))
    }

    pub async fn delete_material(&self, project_id: i32, material_id: i32) -> CoreResult<()> {
        let material = self.find_material(project_id, material_id).await?;
        material
            .delete(&self.db)
            .await
            .map_err(|e| CoreError::database("deleting material", e))?;
        Ok(())
    }

    /// Oldest first, as a conversation reads.
    pub async fn list_comments(&self, project_id: i32) -> CoreResult<Vec<comments::Model>> {
        comments::Entity::find()
            .filter(comments::Column::ProjectId.eq(project_id))
            .order_by_asc(comments::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::database("listing comments", e))
    }

    pub async fn add_comment(
        &self,
        project_id: i32,
        user_id: i32,
        text: &str,
    ) -> CoreResult<comments::Model> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::validation("Comment text is required"));
        }
        self.find(project_id).await?;

        comments::ActiveModel {
            project_id: Set(project_id),
            user_id: Set(user_id),
            text: Set(text.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| CoreError::database("adding comment", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::errors::CoreErrorKind;
    use crate::services::auth_service::AuthService;
    use crate::services::team_service::{NewTeamMember, TeamService};

    async fn setup() -> (ProjectService, TeamService, i32) {
        let db = setup_test_db().await;
        let user = AuthService::new(db.clone())
            .register("owner@studio.test", "Owner", "password123")
            .await
            .unwrap();
        (ProjectService::new(db.clone()), TeamService::new(db), user.id)
    }

    fn input(title: &str) -> ProjectInput {
        ProjectInput {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn new_projects_start_in_ideas() {
        let (projects, _, user_id) = setup().await;
        let detail = projects.create(user_id, input("Beach vlog")).await.unwrap();
        assert_eq!(detail.project.status, "Ideas");
        assert_eq!(detail.project.script, serde_json::json!([]));

        let err = projects.create(user_id, input("  ")).await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::Validation);
    }

    #[tokio::test]
    async fn board_groups_projects_by_status() {
        let (projects, _, user_id) = setup().await;
        let a = projects.create(user_id, input("A")).await.unwrap();
        projects.create(user_id, input("B")).await.unwrap();
        projects
            .set_status(a.project.id, ProjectStatus::InProduction)
            .await
            .unwrap();

        let board = projects.board().await.unwrap();
        assert_eq!(board.len(), 5);
        assert_eq!(board[0].status, ProjectStatus::Ideas);
        assert_eq!(board[0].projects.len(), 1);
        assert_eq!(board[2].status, ProjectStatus::InProduction);
        assert_eq!(board[2].projects[0].title, "A");
    }

    #[tokio::test]
    async fn update_replaces_team_and_materials() {
        let (projects, team, user_id) = setup().await;
        let member = team
            .add_member(NewTeamMember {
                name: "Cam".into(),
                email: "cam@studio.test".into(),
                password: "password123".into(),
                role: crate::database::entities::TeamRole::Member,
            })
            .await
            .unwrap();

        let mut form = input("Shoot day");
        form.team_member_ids = Some(vec![member.id, member.id]);
        form.materials = Some(vec![MaterialInput {
            name: "Tripod".into(),
            checked: false,
        }]);
        let created = projects.create(user_id, form).await.unwrap();
        assert_eq!(created.team_members.len(), 1);
        assert_eq!(created.materials[0].name, "Tripod");

        let mut form = input("Shoot day");
        form.materials = Some(vec![]);
        let updated = projects.update(created.project.id, form).await.unwrap();
        assert!(updated.materials.is_empty());
        assert_eq!(updated.team_members.len(), 1);
    }

    #[tokio::test]
    async fn materials_toggle_and_comments_append() {
        let (projects, _, user_id) = setup().await;
        let project = projects.create(user_id, input("Recipe")).await.unwrap().project;

        let material = projects.add_material(project.id, "Flour").await.unwrap();
        let toggled = projects.toggle_material(project.id, material.id).await.unwrap();
        assert!(toggled.checked);

        projects.add_comment(project.id, user_id, "first").await.unwrap();
        projects.add_comment(project.id, user_id, "second").await.unwrap();
        let texts: Vec<String> = projects
            .list_comments(project.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);

        projects.delete(project.id).await.unwrap();
        assert_eq!(
            projects.get_detail(project.id).await.unwrap_err().kind(),
            CoreErrorKind::NotFound
        );
    }
}
