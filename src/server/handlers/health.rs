use axum::{extract::State, http::StatusCode, response::Json};
use sea_orm::ConnectionTrait;
use serde_json::{json, Value};

use crate::server::app::AppState;
use crate::workflow::Webhook;

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let database = match state.db.execute_unprepared("SELECT 1").await {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };

    Ok(Json(json!({
        "status": "healthy",
        "service": "bosroller-studio",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "workflow": {
            "analyze": state.workflow.is_configured(Webhook::Analyze),
            "chat": state.workflow.is_configured(Webhook::Chat),
        }
    })))
}
