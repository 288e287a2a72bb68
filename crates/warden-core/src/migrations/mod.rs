pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_session_tables;
mod m20250301_000002_create_security_logs;
mod m20250302_000001_create_retention_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_session_tables::Migration),
            Box::new(m20250301_000002_create_security_logs::Migration),
            Box::new(m20250302_000001_create_retention_tables::Migration),
        ]
    }
}
