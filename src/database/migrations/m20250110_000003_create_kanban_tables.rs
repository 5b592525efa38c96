use sea_orm_migration::prelude::*;

use super::m20250110_000001_create_accounts::{TeamMembers, Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Projects::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Projects::UserId).integer().not_null())
                    .col(ColumnDef::new(Projects::Title).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text())
                    .col(
                        ColumnDef::new(Projects::Status)
                            .string()
                            .not_null()
                            .default("Ideas"),
                    )
                    .col(ColumnDef::new(Projects::Location).string())
                    .col(ColumnDef::new(Projects::ShootDate).string())
                    .col(ColumnDef::new(Projects::ShootTime).string())
                    .col(ColumnDef::new(Projects::Notes).text())
                    .col(ColumnDef::new(Projects::Script).json().not_null())
                    .col(ColumnDef::new(Projects::PostedByMemberId).integer())
                    .col(ColumnDef::new(Projects::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Projects::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_user_id")
                            .from(Projects::Table, Projects::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_posted_by_member_id")
                            .from(Projects::Table, Projects::PostedByMemberId)
                            .to(TeamMembers::Table, TeamMembers::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProjectTeamMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectTeamMembers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProjectTeamMembers::ProjectId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectTeamMembers::TeamMemberId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectTeamMembers::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_team_members_project_id")
                            .from(ProjectTeamMembers::Table, ProjectTeamMembers::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_team_members_team_member_id")
                            .from(ProjectTeamMembers::Table, ProjectTeamMembers::TeamMemberId)
                            .to(TeamMembers::Table, TeamMembers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Materials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Materials::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Materials::ProjectId).integer().not_null())
                    .col(ColumnDef::new(Materials::Name).string().not_null())
                    .col(
                        ColumnDef::new(Materials::Checked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Materials::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_materials_project_id")
                            .from(Materials::Table, Materials::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Comments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Comments::ProjectId).integer().not_null())
                    .col(ColumnDef::new(Comments::UserId).integer().not_null())
                    .col(ColumnDef::new(Comments::Text).text().not_null())
                    .col(ColumnDef::new(Comments::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_project_id")
                            .from(Comments::Table, Comments::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comments_project")
                    .table(Comments::Table)
                    .col(Comments::ProjectId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_comments_project")
                    .table(Comments::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Materials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectTeamMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    UserId,
    Title,
    Description,
    Status,
    Location,
    ShootDate,
    ShootTime,
    Notes,
    Script,
    PostedByMemberId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ProjectTeamMembers {
    Table,
    Id,
    ProjectId,
    TeamMemberId,
    CreatedAt,
}

#[derive(Iden)]
enum Materials {
    Table,
    Id,
    ProjectId,
    Name,
    Checked,
    CreatedAt,
}

#[derive(Iden)]
enum Comments {
    Table,
    Id,
    ProjectId,
    UserId,
    Text,
    CreatedAt,
}
