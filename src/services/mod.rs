pub mod auth_service;
pub mod authorization;
pub mod project_service;
pub mod team_service;
pub mod video_analysis_service;

pub use auth_service::AuthService;
pub use authorization::AuthorizationService;
pub use project_service::{BoardColumn, MaterialInput, ProjectDetail, ProjectInput, ProjectService};
pub use team_service::{NewTeamMember, TeamService};
pub use video_analysis_service::VideoAnalysisService;
