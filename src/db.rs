use std::time::Duration;

use migrations::Migrator;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Establishes the SeaORM connection pool described by the application
/// config, running migrations when `auto_migrate` is set.
pub async fn establish_connection(config: &AppConfig) -> Result<DatabaseConnection, ServiceError> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(Duration::from_secs(config.db_connect_timeout_secs))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;

    if config.auto_migrate {
        info!("running database migrations");
        Migrator::up(&db, None).await?;
    }

    Ok(db)
}
