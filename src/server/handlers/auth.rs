use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::entities::{team_members, users};
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::server::extractors::CurrentUser;
use crate::services::{AuthService, AuthorizationService};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub user: users::Model,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: users::Model,
    pub team_member: Option<team_members::Model>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> CoreResult<Json<LoginResponse>> {
    let (user, session) = AuthService::new(state.db.clone())
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(LoginResponse {
        session_id: session.session_id,
        expires_at: session.expires_at,
        user,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> CoreResult<StatusCode> {
    AuthService::new(state.db.clone())
        .logout(&current.session_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<AppState>,
    current: CurrentUser,
) -> CoreResult<Json<MeResponse>> {
    let team_member = AuthorizationService::new(state.db.clone())
        .team_membership(current.user.id)
        .await?;
    Ok(Json(MeResponse {
        user: current.user,
        team_member,
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> CoreResult<StatusCode> {
    AuthService::new(state.db.clone())
        .change_password(
            current.user.id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
