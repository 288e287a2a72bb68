use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;

use crate::config::Config;
use crate::migrations::Migrator;

/// Initialize the database connection from config.
pub async fn connect(config: &Config) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let mut opts = ConnectOptions::new(&config.database_url);
    opts.max_connections(config.database_max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(config.is_dev());

    SeaDatabase::connect(opts).await
}

/// Connect and apply every pending migration.
pub async fn connect_and_migrate(config: &Config) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let db = connect(config).await?;
    tracing::info!("Running pending database migrations...");
    Migrator::up(&db, None).await?;
    tracing::info!("Migrations complete.");
    Ok(db)
}
