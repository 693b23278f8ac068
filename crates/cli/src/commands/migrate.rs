use reqflow_core::config::{AppConfig, LoadOptions};
use reqflow_db::{connect, migrations};

use super::{
    CommandOutcome, CommandResult, EXIT_CONFIG_VALIDATION, EXIT_DB_CONNECTIVITY, EXIT_EXECUTION,
};

pub async fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                EXIT_CONFIG_VALIDATION,
                CommandOutcome::failed("migrate", "config_validation", error.to_string()).render(),
            )
        }
    };

    let pool = match connect(&config.database).await {
        Ok(pool) => pool,
        Err(error) => {
            return CommandResult::failure(
                EXIT_DB_CONNECTIVITY,
                CommandOutcome::failed("migrate", "db_connectivity", error.to_string()).render(),
            )
        }
    };

    let result = match migrations::run_pending(&pool).await {
        Ok(()) => CommandResult::success(
            CommandOutcome::ok(
                "migrate",
                format!("schema is up to date for {}", config.database.url),
            )
            .render(),
        ),
        Err(error) => CommandResult::failure(
            EXIT_EXECUTION,
            CommandOutcome::failed("migrate", "migration_execution", error.to_string()).render(),
        ),
    };
    pool.close().await;
    result
}
