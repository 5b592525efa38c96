use std::fmt;
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// An uploaded video and the lifecycle of its analysis.
///
/// `analysis_data` is produced entirely by the workflow engine and stored as-is.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "video_analyses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: i32,
    pub video_url: Option<String>,
    pub file_name: String,
    pub file_size: Option<i64>,
    pub duration: Option<i32>,
    pub uploaded_at: ChronoDateTimeUtc,
    pub status: String, // 'uploading', 'processing', 'completed', 'failed'
    #[sea_orm(column_type = "JsonBinary")]
    pub analysis_data: Option<serde_json::Value>,
    #[sea_orm(column_type = "JsonBinary")]
    pub chat_history: serde_json::Value,
    pub error_message: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
    pub completed_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn new(user_id: i32, file_name: String, file_size: i64, duration: Option<i32>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Set(uuid::Uuid::new_v4().to_string()),
            user_id: Set(user_id),
            video_url: Set(None),
            file_name: Set(file_name),
            file_size: Set(Some(file_size)),
            duration: Set(duration),
            uploaded_at: Set(now),
            status: Set(VideoStatus::Uploading.as_str().to_string()),
            analysis_data: Set(None),
            chat_history: Set(serde_json::Value::Array(Vec::new())),
            error_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: ActiveValue::NotSet,
        }
    }
}

impl Model {
    pub fn video_status(&self) -> Result<VideoStatus, CoreError> {
        self.status.parse()
    }

    /// Decodes the stored transcript; malformed entries yield an empty history.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        serde_json::from_value(self.chat_history.clone()).unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploading => "uploading",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            VideoStatus::Uploading => 0,
            VideoStatus::Processing => 1,
            VideoStatus::Completed | VideoStatus::Failed => 2,
        }
    }

    /// Status only moves forward: uploading -> processing -> completed|failed.
    ///
    /// Terminal to terminal is accepted so a repeated callback overwrites the
    /// previous outcome.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        if self.is_terminal() {
            return next.is_terminal();
        }
        next.rank() > self.rank()
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(VideoStatus::Uploading),
            "processing" => Ok(VideoStatus::Processing),
            "completed" => Ok(VideoStatus::Completed),
            "failed" => Ok(VideoStatus::Failed),
            other => Err(CoreError::validation(format!(
                "Invalid video status: {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ChatMessage {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}
