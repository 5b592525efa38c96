use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use bosroller::config::{AppConfig, ConfigValidator};
use bosroller::console::{self, ConnectionOptions};
use bosroller::database::{connection::*, migrations::Migrator};
use bosroller::database::entities::TeamRole;
use bosroller::drive::GoogleDriveClient;
use bosroller::server::{self, MigrateDirection};
use bosroller::services::{NewTeamMember, TeamService};
use bosroller::workflow::diagnostics;
use sea_orm_migration::MigratorTrait;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Overrides BIND_ADDRESS.
        #[clap(short, long)]
        bind: Option<String>,
        /// Overrides DATABASE_URL.
        #[clap(short, long)]
        database: Option<String>,
        #[clap(long)]
        cors_origin: Option<String>,
    },
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    /// Validate the environment without starting the server.
    CheckConfig {
        /// Also validate and probe the Google Drive integration.
        #[clap(long)]
        drive: bool,
    },
    /// Send test payloads to the configured n8n webhooks.
    Diagnose {
        /// Write the JSON summary to this file.
        #[clap(long)]
        export: Option<PathBuf>,
        #[clap(long, default_value = "30")]
        timeout_secs: u64,
    },
    User {
        #[clap(subcommand)]
        command: UserCommands,
    },
    Video {
        #[clap(flatten)]
        connection: ConnectionOptions,
        #[clap(subcommand)]
        command: VideoCommands,
    },
    Projects {
        #[clap(flatten)]
        connection: ConnectionOptions,
        #[clap(subcommand)]
        command: ProjectCommands,
    },
    Team {
        #[clap(flatten)]
        connection: ConnectionOptions,
        #[clap(subcommand)]
        command: TeamCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init {
        #[clap(short, long)]
        database: Option<String>,
    },
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
        #[clap(short, long)]
        database: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// Create a login with a team roster entry.
    Create {
        #[clap(long)]
        email: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        password: String,
        /// Give the member the admin role.
        #[clap(long)]
        admin: bool,
    },
}

#[derive(Subcommand, Debug)]
enum VideoCommands {
    /// Upload a video and wait for its analysis.
    Analyze {
        path: PathBuf,
        /// Duration in whole seconds.
        #[clap(long)]
        duration: Option<i32>,
        /// Return once the analysis is queued.
        #[clap(long)]
        no_wait: bool,
    },
    List,
    Show { id: String },
    Chat { id: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum ProjectCommands {
    Board,
}

#[derive(Subcommand, Debug)]
enum TeamCommands {
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Serve {
            bind,
            database,
            cors_origin,
        } => {
            let mut config = AppConfig::from_env();
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            if let Some(database) = database {
                config.database_url = database;
            }
            if cors_origin.is_some() {
                config.cors_origin = cors_origin;
            }
            info!("Starting server on {}", config.bind_address);
            server::start_server(config).await?;
        }
        Commands::Db { command } => {
            let config = AppConfig::from_env();
            match command {
                DbCommands::Init { database } => {
                    let database = database.unwrap_or(config.database_url);
                    info!("Initializing database: {}", database);
                    server::migrate_database(&database, MigrateDirection::Up).await?;
                }
                DbCommands::Migrate {
                    direction,
                    database,
                } => {
                    let database = database.unwrap_or(config.database_url);
                    info!("Running database migration: {:?}", direction);
                    server::migrate_database(&database, direction).await?;
                }
            }
        }
        Commands::CheckConfig { drive } => {
            let config = AppConfig::from_env();
            let validator = ConfigValidator::new(&config);
            let backend = validator.validate_backend();
            println!("{}", backend.render());
            let mut valid = backend.is_valid();

            if drive || config.drive.is_configured() {
                let client =
                    GoogleDriveClient::new(config.drive.access_token.clone().unwrap_or_default());
                let report = validator.validate_drive(&client).await;
                println!("{}", report.render());
                valid &= report.is_valid();
            }

            if !valid {
                bail!("Configuration validation failed");
            }
        }
        Commands::Diagnose {
            export,
            timeout_secs,
        } => {
            let config = AppConfig::from_env();
            let report =
                diagnostics::run_diagnostics(&config.workflow, Duration::from_secs(timeout_secs))
                    .await;
            println!("{}", report.render());
            if let Some(path) = export {
                tokio::fs::write(&path, report.to_json()).await?;
                info!("Diagnostics written to {}", path.display());
            }
        }
        Commands::User { command } => match command {
            UserCommands::Create {
                email,
                name,
                password,
                admin,
            } => {
                let config = AppConfig::from_env();
                let db = establish_connection(&get_database_url(Some(&config.database_url))).await?;
                Migrator::up(&db, None).await?;

                let role = if admin { TeamRole::Admin } else { TeamRole::Member };
                let member = TeamService::new(db)
                    .add_member(NewTeamMember {
                        name,
                        email,
                        password,
                        role,
                    })
                    .await?;
                println!("Created {} ({}) as {}", member.name, member.email, member.role);
            }
        },
        Commands::Video {
            connection,
            command,
        } => {
            let client = console::connect(&connection).await?;
            match command {
                VideoCommands::Analyze {
                    path,
                    duration,
                    no_wait,
                } => console::analyze_video(&client, &path, duration, !no_wait).await?,
                VideoCommands::List => console::list_videos(&client).await?,
                VideoCommands::Show { id } => console::show_video(&client, &id).await?,
                VideoCommands::Chat { id } => console::chat(&client, &id).await?,
                VideoCommands::Delete { id } => console::delete_video(&client, &id).await?,
            }
        }
        Commands::Projects {
            connection,
            command,
        } => {
            let client = console::connect(&connection).await?;
            match command {
                ProjectCommands::Board => console::show_board(&client).await?,
            }
        }
        Commands::Team {
            connection,
            command,
        } => {
            let client = console::connect(&connection).await?;
            match command {
                TeamCommands::List => console::list_team(&client).await?,
            }
        }
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
