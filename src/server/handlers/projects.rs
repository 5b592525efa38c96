use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use crate::database::entities::{comments, materials, projects, ProjectStatus};
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::server::extractors::CurrentUser;
use crate::services::{BoardColumn, ProjectDetail, ProjectInput};

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: ProjectStatus,
}

#[derive(Deserialize)]
pub struct MaterialRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

pub async fn list_projects(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> CoreResult<Json<Vec<projects::Model>>> {
    Ok(Json(state.projects.list().await?))
}

pub async fn get_board(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> CoreResult<Json<Vec<BoardColumn>>> {
    Ok(Json(state.projects.board().await?))
}

pub async fn create_project(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<ProjectInput>,
) -> CoreResult<Json<ProjectDetail>> {
    Ok(Json(state.projects.create(current.user.id, payload).await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i32>,
) -> CoreResult<Json<ProjectDetail>> {
    Ok(Json(state.projects.get_detail(id).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<ProjectInput>,
) -> CoreResult<Json<ProjectDetail>> {
    Ok(Json(state.projects.update(id, payload).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i32>,
) -> CoreResult<StatusCode> {
    state.projects.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_project_status(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<StatusRequest>,
) -> CoreResult<Json<projects::Model>> {
    Ok(Json(state.projects.set_status(id, payload.status).await?))
}

pub async fn add_material(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<MaterialRequest>,
) -> CoreResult<Json<materials::Model>> {
    Ok(Json(state.projects.add_material(id, &payload.name).await?))
}

pub async fn toggle_material(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path((id, material_id)): Path<(i32, i32)>,
) -> CoreResult<Json<materials::Model>> {
    Ok(Json(state.projects.toggle_material(id, material_id).await?))
}

pub async fn delete_material(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path((id, material_id)): Path<(i32, i32)>,
) -> CoreResult<StatusCode> {
    state.projects.delete_material(id, material_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_comments(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i32>,
) -> CoreResult<Json<Vec<comments::Model>>> {
    Ok(Json(state.projects.list_comments(id).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
    Json(payload): Json<CommentRequest>,
) -> CoreResult<Json<comments::Model>> {
    Ok(Json(
        state
            .projects
            .add_comment(id, current.user.id, &payload.text)
            .await?,
    ))
}
