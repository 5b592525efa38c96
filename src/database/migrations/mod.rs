pub use sea_orm_migration::prelude::*;

mod m20250110_000001_create_accounts;
mod m20250110_000002_create_video_analyses;
mod m20250110_000003_create_kanban_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250110_000001_create_accounts::Migration),
            Box::new(m20250110_000002_create_video_analyses::Migration),
            Box::new(m20250110_000003_create_kanban_tables::Migration),
        ]
    }
}
