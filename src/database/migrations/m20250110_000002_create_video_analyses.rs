use sea_orm_migration::prelude::*;

use super::m20250110_000001_create_accounts::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VideoAnalyses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VideoAnalyses::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VideoAnalyses::UserId).integer().not_null())
                    .col(ColumnDef::new(VideoAnalyses::VideoUrl).string())
                    .col(ColumnDef::new(VideoAnalyses::FileName).string().not_null())
                    .col(ColumnDef::new(VideoAnalyses::FileSize).big_integer())
                    .col(ColumnDef::new(VideoAnalyses::Duration).integer())
                    .col(ColumnDef::new(VideoAnalyses::UploadedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(VideoAnalyses::Status)
                            .string()
                            .not_null()
                            .default("uploading"),
                    )
                    .col(ColumnDef::new(VideoAnalyses::AnalysisData).json())
                    .col(ColumnDef::new(VideoAnalyses::ChatHistory).json().not_null())
                    .col(ColumnDef::new(VideoAnalyses::ErrorMessage).text())
                    .col(ColumnDef::new(VideoAnalyses::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(VideoAnalyses::UpdatedAt).timestamp().not_null())
                    .col(ColumnDef::new(VideoAnalyses::CompletedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_video_analyses_user_id")
                            .from(VideoAnalyses::Table, VideoAnalyses::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_video_analyses_user_created")
                    .table(VideoAnalyses::Table)
                    .col(VideoAnalyses::UserId)
                    .col(VideoAnalyses::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VideoAnalyses::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum VideoAnalyses {
    Table,
    Id,
    UserId,
    VideoUrl,
    FileName,
    FileSize,
    Duration,
    UploadedAt,
    Status,
    AnalysisData,
    ChatHistory,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}
