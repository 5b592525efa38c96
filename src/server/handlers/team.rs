use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::database::entities::team_members;
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::server::extractors::CurrentUser;
use crate::services::{AuthorizationService, NewTeamMember};

pub async fn list_members(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> CoreResult<Json<Vec<team_members::Model>>> {
    Ok(Json(state.team.list().await?))
}

pub async fn add_member(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<NewTeamMember>,
) -> CoreResult<Json<team_members::Model>> {
    AuthorizationService::new(state.db.clone())
        .require_team_admin(current.user.id)
        .await?;
    Ok(Json(state.team.add_member(payload).await?))
}

pub async fn delete_member(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i32>,
) -> CoreResult<StatusCode> {
    AuthorizationService::new(state.db.clone())
        .require_team_admin(current.user.id)
        .await?;
    state.team.delete_member(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
