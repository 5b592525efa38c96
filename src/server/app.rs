use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers::{auth, functions, health, projects, team, video_analyses};
use crate::config::AppConfig;
use crate::services::{ProjectService, TeamService, VideoAnalysisService};
use crate::storage::{ObjectStore, PUBLIC_OBJECT_PREFIX};
use crate::workflow::WorkflowEngine;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub videos: VideoAnalysisService,
    pub projects: ProjectService,
    pub team: TeamService,
    pub workflow: Arc<dyn WorkflowEngine>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        config: AppConfig,
        store: Arc<dyn ObjectStore>,
        workflow: Arc<dyn WorkflowEngine>,
    ) -> Self {
        let videos = VideoAnalysisService::new(
            db.clone(),
            store,
            config.storage.bucket.clone(),
            config.public_base_url.clone(),
        );
        Self {
            projects: ProjectService::new(db.clone()),
            team: TeamService::new(db.clone()),
            videos,
            workflow,
            config: Arc::new(config),
            db,
        }
    }
}

pub async fn create_app(state: AppState) -> Result<Router> {
    let cors = match state.config.cors_origin.as_deref() {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let upload_limit = match state.config.storage.max_object_bytes {
        Some(limit) => DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX)),
        None => DefaultBodyLimit::disable(),
    };

    let public_objects = ServeDir::new(&state.config.storage.root);

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/functions/v1", function_routes())
        .nest("/api/v1", api_v1_routes(upload_limit))
        .nest_service(PUBLIC_OBJECT_PREFIX, public_objects)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}

/// Endpoints called by the UI and by the workflow engine.
fn function_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/analyze-video",
            post(functions::analyze_video)
                .options(functions::preflight)
                .fallback(functions::method_not_allowed),
        )
        .route(
            "/receive-analysis",
            post(functions::receive_analysis)
                .options(functions::preflight)
                .fallback(functions::method_not_allowed),
        )
        .route(
            "/ask-about-video",
            post(functions::ask_about_video)
                .options(functions::preflight)
                .fallback(functions::method_not_allowed),
        )
        .layer(middleware::map_response(with_function_cors_headers))
}

async fn with_function_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-Client-Info, Apikey"),
    );
    response
}

fn api_v1_routes(upload_limit: DefaultBodyLimit) -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/password", put(auth::change_password))

        // Video analyses
        .route(
            "/video-analyses",
            get(video_analyses::list_analyses).post(video_analyses::create_analysis),
        )
        .route(
            "/video-analyses/:id",
            get(video_analyses::get_analysis).delete(video_analyses::delete_analysis),
        )
        .route(
            "/video-analyses/:id/upload",
            post(video_analyses::upload_video).layer(upload_limit),
        )
        .route("/video-analyses/:id/video", get(video_analyses::download_video))
        .route("/video-analyses/:id/url", put(video_analyses::set_video_url))
        .route(
            "/video-analyses/:id/chat-history",
            put(video_analyses::update_chat_history),
        )

        // Kanban board
        .route("/board", get(projects::get_board))
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/projects/:id/status", put(projects::set_project_status))
        .route("/projects/:id/materials", post(projects::add_material))
        .route(
            "/projects/:id/materials/:material_id",
            delete(projects::delete_material),
        )
        .route(
            "/projects/:id/materials/:material_id/toggle",
            post(projects::toggle_material),
        )
        .route(
            "/projects/:id/comments",
            get(projects::list_comments).post(projects::add_comment),
        )

        // Team roster
        .route("/team", get(team::list_members).post(team::add_member))
        .route("/team/:id", delete(team::delete_member))
}

