#[cfg(test)]
use sea_orm::{Database, DatabaseConnection};

#[cfg(test)]
pub async fn setup_test_db() -> DatabaseConnection {
    // Single connection, otherwise every pooled connection gets its own in-memory database
    let mut opt = sea_orm::ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt)
        .await
        .expect("Failed to connect to test database");

    super::connection::setup_database(&db)
        .await
        .expect("Failed to run migrations");

    db
}
