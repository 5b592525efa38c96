use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: String, // kanban column, see ProjectStatus
    pub location: Option<String>,
    pub shoot_date: Option<String>,
    pub shoot_time: Option<String>,
    pub notes: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub script: serde_json::Value, // [{memberId, memberName, line}]
    pub posted_by_member_id: Option<i32>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::materials::Entity")]
    Materials,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
    #[sea_orm(has_many = "super::project_team_members::Entity")]
    ProjectTeamMembers,
}

impl Related<super::materials::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Materials.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::project_team_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectTeamMembers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    Ideas,
    Planned,
    #[serde(rename = "In Production")]
    InProduction,
    Finished,
    Posted,
}

impl ProjectStatus {
    /// Board columns, left to right.
    pub const ALL: [ProjectStatus; 5] = [
        ProjectStatus::Ideas,
        ProjectStatus::Planned,
        ProjectStatus::InProduction,
        ProjectStatus::Finished,
        ProjectStatus::Posted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Ideas => "Ideas",
            ProjectStatus::Planned => "Planned",
            ProjectStatus::InProduction => "In Production",
            ProjectStatus::Finished => "Finished",
            ProjectStatus::Posted => "Posted",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::validation(format!("Invalid project status: {}", s)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptLine {
    pub member_id: String,
    pub member_name: String,
    pub line: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_display_names() {
        for status in ProjectStatus::ALL {
            assert_eq!(status.as_str().parse::<ProjectStatus>().unwrap(), status);
        }
        assert!("In production".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn in_production_serializes_with_space() {
        let value = serde_json::to_value(ProjectStatus::InProduction).unwrap();
        assert_eq!(value, serde_json::json!("In Production"));
    }
}
