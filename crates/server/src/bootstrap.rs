//! Runtime initialization shared by the server binary and integration
//! tests: load configuration, open the pool, run pending migrations.

use thiserror::Error;
use tracing::info;

use reqflow_core::config::{AppConfig, ConfigError, LoadOptions};
use reqflow_db::{connect, migrations, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not connect to the database: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Migrations run on every boot; `sqlx` skips the ones already applied.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.started",
        database = %config.database.url,
        "initializing runtime"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;

    info!(event_name = "system.bootstrap.completed", "reqflow-server runtime initialized");
    Ok(Application { config, db_pool })
}
