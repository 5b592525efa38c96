pub mod comments;
pub mod materials;
pub mod project_team_members;
pub mod projects;
pub mod team_members;
pub mod user_sessions;
pub mod users;
pub mod video_analyses;

pub use projects::{ProjectStatus, ScriptLine};
pub use team_members::TeamRole;
pub use video_analyses::{ChatMessage, ChatRole, VideoStatus};
