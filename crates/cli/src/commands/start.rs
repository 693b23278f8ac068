//! Preflight for service startup: proves the configuration is valid and
//! the database is reachable, then exits. Serving itself belongs to the
//! `reqflow-server` binary.

use reqflow_core::config::{AppConfig, LoadOptions};
use reqflow_db::connect;

use super::{CommandOutcome, CommandResult, EXIT_CONFIG_VALIDATION, EXIT_DB_CONNECTIVITY};

pub async fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                EXIT_CONFIG_VALIDATION,
                CommandOutcome::failed("start", "config_validation", error.to_string()).render(),
            )
        }
    };

    let pool = match connect(&config.database).await {
        Ok(pool) => pool,
        Err(error) => {
            return CommandResult::failure(
                EXIT_DB_CONNECTIVITY,
                CommandOutcome::failed("start", "db_connectivity", error.to_string()).render(),
            )
        }
    };

    if let Err(error) = sqlx::query("SELECT 1").execute(&pool).await {
        pool.close().await;
        return CommandResult::failure(
            EXIT_DB_CONNECTIVITY,
            CommandOutcome::failed("start", "db_connectivity", error.to_string()).render(),
        );
    }
    pool.close().await;

    CommandResult::success(
        CommandOutcome::ok(
            "start",
            format!(
                "preflight passed for {}; run reqflow-server to serve on port {}",
                config.database.url, config.server.api_port
            ),
        )
        .render(),
    )
}
