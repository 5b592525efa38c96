pub mod auth;
pub mod functions;
pub mod health;
pub mod projects;
pub mod team;
pub mod video_analyses;
