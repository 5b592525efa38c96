use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;

use super::migrations::Migrator;

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);

    // SQLite serialises writes, so a small pool is enough
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(3600))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    Database::connect(opt).await
}

pub fn get_database_url(database_path: Option<&str>) -> String {
    match database_path {
        Some(path) if path == ":memory:" => "sqlite::memory:".to_string(),
        Some(path) if path.starts_with("sqlite:") => path.to_string(),
        Some(path) => format!("sqlite://{}?mode=rwc", path),
        None => "sqlite://bosroller.db?mode=rwc".to_string(),
    }
}

/// Runs all pending migrations.
pub async fn setup_database(db: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(db, None).await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).sqlx_logging(false);
        Database::connect(opt).await.unwrap()
    }

    async fn comment_index_count(db: &DatabaseConnection) -> i64 {
        use sea_orm::{ConnectionTrait, DbBackend, Statement};

        let row = db
            .query_one(Statement::from_string(
                DbBackend::Sqlite,
                "SELECT COUNT(*) AS n FROM sqlite_master \
                 WHERE type = 'index' AND name = 'idx_comments_project'",
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get("", "n").unwrap()
    }

    #[tokio::test]
    async fn setup_database_creates_schema_on_sqlite() {
        let db = memory_db().await;
        setup_database(&db).await.unwrap();

        assert_eq!(comment_index_count(&db).await, 1);
        // Running again is a no-op
        setup_database(&db).await.unwrap();
    }

    #[tokio::test]
    async fn migrations_roll_back_and_reapply() {
        let db = memory_db().await;
        setup_database(&db).await.unwrap();

        Migrator::down(&db, None).await.unwrap();
        assert_eq!(comment_index_count(&db).await, 0);

        Migrator::up(&db, None).await.unwrap();
        assert_eq!(comment_index_count(&db).await, 1);
    }

    #[test]
    fn database_url_variants() {
        assert_eq!(get_database_url(Some(":memory:")), "sqlite::memory:");
        assert_eq!(get_database_url(Some("data/app.db")), "sqlite://data/app.db?mode=rwc");
        assert_eq!(
            get_database_url(Some("sqlite://other.db")),
            "sqlite://other.db"
        );
        assert_eq!(get_database_url(None), "sqlite://bosroller.db?mode=rwc");
    }
}
