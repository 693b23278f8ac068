//! Runs the commands in-process against scratch databases. Environment
//! mutation is serialized through a lock and every key is restored, so the
//! tests can run in parallel with the rest of the suite.

use std::env;
use std::future::Future;
use std::sync::{Mutex, OnceLock};

use reqflow_cli::commands;

const MANAGED_KEYS: &[&str] = &[
    "REQFLOW_DATABASE_URL",
    "REQFLOW_DATABASE_MAX_CONNECTIONS",
    "REQFLOW_DATABASE_TIMEOUT_SECS",
    "REQFLOW_SERVER_BIND_ADDRESS",
    "REQFLOW_SERVER_API_PORT",
    "REQFLOW_SERVER_HEALTH_CHECK_PORT",
    "REQFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS",
    "REQFLOW_NOTIFIER_ENABLED",
    "REQFLOW_NOTIFIER_WEBHOOK_URL",
    "REQFLOW_NOTIFIER_AUTH_TOKEN",
    "REQFLOW_NOTIFIER_TIMEOUT_SECS",
    "REQFLOW_LOGGING_LEVEL",
    "REQFLOW_LOG_LEVEL",
    "REQFLOW_LOGGING_FORMAT",
    "REQFLOW_LOG_FORMAT",
];

fn with_env<T>(vars: &[(&str, &str)], run: impl FnOnce() -> T) -> T {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let saved: Vec<(&str, Option<String>)> =
        MANAGED_KEYS.iter().map(|key| (*key, env::var(key).ok())).collect();
    for key in MANAGED_KEYS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    let result = run();

    for (key, value) in saved {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
    result
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

fn last_line(output: &str) -> &str {
    output.lines().last().expect("output is not empty")
}

fn parse_payload(output: &str) -> serde_json::Value {
    serde_json::from_str(last_line(output)).expect("last line is JSON")
}

const SCRATCH_DB: [(&str, &str); 2] = [
    ("REQFLOW_DATABASE_URL", "sqlite::memory:?cache=shared"),
    ("REQFLOW_DATABASE_MAX_CONNECTIONS", "1"),
];

#[test]
fn start_preflight_passes_against_a_scratch_database() {
    let result = with_env(&SCRATCH_DB, || block_on(commands::start::run()));

    assert_eq!(result.exit_code, 0, "output: {}", result.output);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "start");
    assert_eq!(payload["status"], "ok");
}

#[test]
fn start_fails_fast_on_an_invalid_database_url() {
    let result = with_env(&[("REQFLOW_DATABASE_URL", "postgres://nope")], || {
        block_on(commands::start::run())
    });

    assert_eq!(result.exit_code, 2);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "config_validation");
}

#[test]
fn migrate_applies_the_schema() {
    let result = with_env(&SCRATCH_DB, || block_on(commands::migrate::run()));

    assert_eq!(result.exit_code, 0, "output: {}", result.output);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "migrate");
    assert_eq!(payload["status"], "ok");
}

#[test]
fn seed_loads_the_demo_dataset_and_is_repeatable() {
    with_env(&SCRATCH_DB, || {
        let first = block_on(commands::seed::run());
        assert_eq!(first.exit_code, 0, "output: {}", first.output);
        let payload = parse_payload(&first.output);
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().expect("message").contains("8 staff"));

        let second = block_on(commands::seed::run());
        assert_eq!(second.exit_code, 0, "output: {}", second.output);
    });
}

#[test]
fn smoke_passes_with_a_default_environment() {
    let result = with_env(&SCRATCH_DB, || block_on(commands::smoke::run()));

    assert_eq!(result.exit_code, 0, "output: {}", result.output);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "smoke");
    let checks = payload["checks"].as_array().expect("checks");
    assert_eq!(checks.len(), 4);
    assert!(checks.iter().all(|check| check["status"] == "pass"));
}

#[test]
fn smoke_fails_when_the_notifier_is_enabled_without_a_webhook() {
    let result = with_env(&[("REQFLOW_NOTIFIER_ENABLED", "true")], || {
        block_on(commands::smoke::run())
    });

    assert_eq!(result.exit_code, 6, "output: {}", result.output);
    let payload = parse_payload(&result.output);
    let checks = payload["checks"].as_array().expect("checks");
    assert_eq!(checks[0]["name"], "config_validation");
    assert_eq!(checks[0]["status"], "fail");
    assert!(checks[1..].iter().all(|check| check["status"] == "skip"));
}

#[test]
fn doctor_emits_a_parseable_json_report() {
    let result = with_env(&SCRATCH_DB, || block_on(commands::doctor::run(true)));

    assert_eq!(result.exit_code, 0, "output: {}", result.output);
    let payload: serde_json::Value =
        serde_json::from_str(&result.output).expect("doctor --json output is JSON");
    assert_eq!(payload["command"], "doctor");
    let checks = payload["checks"].as_array().expect("checks");
    assert!(checks.iter().all(|check| check["status"] == "ok"));
}

#[test]
fn doctor_reports_a_disabled_notifier_as_healthy() {
    let result = with_env(&SCRATCH_DB, || block_on(commands::doctor::run(false)));

    assert_eq!(result.exit_code, 0);
    assert!(result.output.contains("- [ok] notifier_readiness: notifier disabled"));
}

#[test]
fn config_names_the_source_of_every_value() {
    let result = with_env(&SCRATCH_DB, || block_on(commands::config::run()));

    assert_eq!(result.exit_code, 0, "output: {}", result.output);
    assert!(result.output.contains(
        "- database.url = sqlite::memory:?cache=shared (source: env(REQFLOW_DATABASE_URL))"
    ));
    assert!(result.output.contains("- logging.level = info (source: default)"));
    assert!(result.output.contains("- notifier.auth_token = (unset)"));
}
