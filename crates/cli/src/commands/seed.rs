use reqflow_core::config::{AppConfig, LoadOptions};
use reqflow_db::{connect, migrations, SeedDataset};

use super::{
    CommandOutcome, CommandResult, EXIT_CONFIG_VALIDATION, EXIT_DB_CONNECTIVITY, EXIT_EXECUTION,
    EXIT_VERIFICATION,
};

pub async fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                EXIT_CONFIG_VALIDATION,
                CommandOutcome::failed("seed", "config_validation", error.to_string()).render(),
            )
        }
    };

    let pool = match connect(&config.database).await {
        Ok(pool) => pool,
        Err(error) => {
            return CommandResult::failure(
                EXIT_DB_CONNECTIVITY,
                CommandOutcome::failed("seed", "db_connectivity", error.to_string()).render(),
            )
        }
    };

    let result = seed_pool(&pool).await;
    pool.close().await;
    result
}

async fn seed_pool(pool: &reqflow_db::DbPool) -> CommandResult {
    if let Err(error) = migrations::run_pending(pool).await {
        return CommandResult::failure(
            EXIT_EXECUTION,
            CommandOutcome::failed("seed", "migration_execution", error.to_string()).render(),
        );
    }

    let loaded = match SeedDataset::load(pool).await {
        Ok(loaded) => loaded,
        Err(error) => {
            return CommandResult::failure(
                EXIT_EXECUTION,
                CommandOutcome::failed("seed", "seed_execution", error.to_string()).render(),
            )
        }
    };

    let verification = match SeedDataset::verify(pool).await {
        Ok(verification) => verification,
        Err(error) => {
            return CommandResult::failure(
                EXIT_EXECUTION,
                CommandOutcome::failed("seed", "seed_execution", error.to_string()).render(),
            )
        }
    };

    if !verification.all_present {
        return CommandResult::failure(
            EXIT_VERIFICATION,
            CommandOutcome::failed(
                "seed",
                "seed_verification",
                failed_checks_message(&verification.checks),
            )
            .render(),
        );
    }

    CommandResult::success(
        CommandOutcome::ok(
            "seed",
            format!(
                "seeded {} staff, {} requests, {} quotations, {} orders; all checks passed",
                loaded.staff_seeded,
                loaded.requests_seeded,
                loaded.quotations_seeded,
                loaded.orders_seeded
            ),
        )
        .render(),
    )
}

fn failed_checks_message(checks: &[(&'static str, bool)]) -> String {
    let failed: Vec<&str> =
        checks.iter().filter(|(_, present)| !present).map(|(name, _)| *name).collect();
    format!("{} of {} checks failed: {}", failed.len(), checks.len(), failed.join(", "))
}
