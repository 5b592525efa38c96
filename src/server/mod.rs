pub mod app;
pub mod error;
pub mod extractors;
pub mod handlers;

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Subcommand;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use crate::config::{AppConfig, ConfigValidator};
use crate::database::{connection::*, migrations::Migrator};
use crate::drive::GoogleDriveClient;
use crate::http::LoggingInterceptor;
use crate::storage::LocalObjectStore;
use crate::workflow::N8nClient;

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let validator = ConfigValidator::new(&config);
    let report = validator.validate_backend();
    if report.has_errors() {
        for check in report.errors() {
            error!("Step {} {}: {}", check.step, check.name, check.message);
        }
        bail!("Configuration is invalid, refusing to start");
    }

    if config.drive.is_configured() {
        let token = config.drive.access_token.clone().unwrap_or_default();
        let drive = GoogleDriveClient::new(token);
        let drive_report = validator.validate_drive(&drive).await;
        if drive_report.has_errors() {
            for check in drive_report.errors() {
                error!("Step {} {}: {}", check.step, check.name, check.message);
            }
            bail!("Google Drive configuration is invalid, refusing to start");
        }
        info!("Google Drive configuration verified");
    }

    let database_url = get_database_url(Some(&config.database_url));
    let db = establish_connection(&database_url).await?;

    Migrator::up(&db, None).await?;
    info!("Database migrations completed");

    let store = LocalObjectStore::new(config.storage.root.clone(), config.storage.max_object_bytes);
    let workflow = N8nClient::with_interceptor(
        config.workflow.clone(),
        Arc::new(LoggingInterceptor::default()),
    )?;
    if config.workflow.webhook_url.is_none() {
        warn!("N8N_WEBHOOK_URL is not set, analysis triggers will be rejected");
    }

    let bind_address = config.bind_address.clone();
    let state = app::AppState::new(db, config, Arc::new(store), Arc::new(workflow));
    let app = app::create_app(state).await?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server running on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  /health                              - Health check");
    info!("  /functions/v1/analyze-video          - Forward a video to the workflow engine");
    info!("  /functions/v1/receive-analysis       - Workflow engine result callback");
    info!("  /functions/v1/ask-about-video        - Chat relay");
    info!("  /api/v1/*                            - REST API (auth, videos, board, team)");
    info!("  /storage/v1/object/public/*          - Public video objects");
}

pub async fn migrate_database(database_url: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_url));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}
