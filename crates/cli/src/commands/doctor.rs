//! Environment diagnosis: configuration, database connectivity, and
//! notifier readiness, reported as human lines or JSON.

use serde::Serialize;

use reqflow_core::config::{AppConfig, LoadOptions};
use reqflow_db::connect;
use reqflow_notify::WebhookSink;

use super::{CommandResult, EXIT_CONFIG_VALIDATION, EXIT_DB_CONNECTIVITY};

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: &'static str,
    pub details: String,
}

impl DoctorCheck {
    fn ok(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: "ok", details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: "fail", details: details.into() }
    }

    fn skip(name: &'static str) -> Self {
        Self { name, status: "skip", details: "skipped after an earlier failure".to_owned() }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub command: &'static str,
    pub checks: Vec<DoctorCheck>,
}

pub async fn run(json: bool) -> CommandResult {
    let mut report = DoctorReport { command: "doctor", checks: Vec::new() };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            report
                .checks
                .push(DoctorCheck::ok("config_validation", "configuration loads and validates"));
            Some(config)
        }
        Err(error) => {
            report.checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            None
        }
    };

    match &config {
        Some(config) => report.checks.push(database_check(config).await),
        None => report.checks.push(DoctorCheck::skip("database_connectivity")),
    }

    match &config {
        Some(config) => report.checks.push(notifier_check(config)),
        None => report.checks.push(DoctorCheck::skip("notifier_readiness")),
    }

    let exit_code = exit_code_for(&report);
    let output = if json {
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_owned())
    } else {
        report
            .checks
            .iter()
            .map(|check| format!("- [{}] {}: {}", check.status, check.name, check.details))
            .collect::<Vec<_>>()
            .join("\n")
    };

    if exit_code == 0 {
        CommandResult::success(output)
    } else {
        CommandResult::failure(exit_code, output)
    }
}

async fn database_check(config: &AppConfig) -> DoctorCheck {
    let pool = match connect(&config.database).await {
        Ok(pool) => pool,
        Err(error) => return DoctorCheck::fail("database_connectivity", error.to_string()),
    };

    let check = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await {
        Ok(_) => DoctorCheck::ok(
            "database_connectivity",
            format!("{} is reachable", config.database.url),
        ),
        Err(error) => DoctorCheck::fail("database_connectivity", error.to_string()),
    };
    pool.close().await;
    check
}

fn notifier_check(config: &AppConfig) -> DoctorCheck {
    if !config.notifier.enabled {
        return DoctorCheck::ok("notifier_readiness", "notifier disabled");
    }

    match WebhookSink::from_config(&config.notifier) {
        Ok(_) => DoctorCheck::ok(
            "notifier_readiness",
            format!(
                "webhook configured at {}",
                config.notifier.webhook_url.as_deref().unwrap_or("(unset)")
            ),
        ),
        Err(error) => DoctorCheck::fail("notifier_readiness", error.to_string()),
    }
}

fn exit_code_for(report: &DoctorReport) -> u8 {
    for check in &report.checks {
        if check.status != "fail" {
            continue;
        }
        return match check.name {
            "database_connectivity" => EXIT_DB_CONNECTIVITY,
            _ => EXIT_CONFIG_VALIDATION,
        };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::{exit_code_for, DoctorCheck, DoctorReport};
    use crate::commands::{EXIT_CONFIG_VALIDATION, EXIT_DB_CONNECTIVITY};

    #[test]
    fn the_first_failure_picks_the_exit_code() {
        let healthy = DoctorReport {
            command: "doctor",
            checks: vec![DoctorCheck::ok("config_validation", "fine")],
        };
        assert_eq!(exit_code_for(&healthy), 0);

        let db_down = DoctorReport {
            command: "doctor",
            checks: vec![
                DoctorCheck::ok("config_validation", "fine"),
                DoctorCheck::fail("database_connectivity", "no such file"),
            ],
        };
        assert_eq!(exit_code_for(&db_down), EXIT_DB_CONNECTIVITY);

        let bad_config = DoctorReport {
            command: "doctor",
            checks: vec![DoctorCheck::fail("config_validation", "bad url")],
        };
        assert_eq!(exit_code_for(&bad_config), EXIT_CONFIG_VALIDATION);
    }
}
