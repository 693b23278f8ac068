//! Prints the effective configuration with the source of every value:
//! an environment variable, a key in the config file, or the built-in
//! default. Secrets are redacted.

use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;

use reqflow_core::config::{AppConfig, LoadOptions, LogFormat};

use super::{CommandOutcome, CommandResult, EXIT_CONFIG_VALIDATION};

pub async fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                EXIT_CONFIG_VALIDATION,
                CommandOutcome::failed("config", "config_validation", error.to_string()).render(),
            )
        }
    };

    let file = load_config_document();
    let mut lines = vec!["effective configuration:".to_owned()];

    lines.push(line("database.url", &config.database.url, &["REQFLOW_DATABASE_URL"], &file));
    lines.push(line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        &["REQFLOW_DATABASE_MAX_CONNECTIONS"],
        &file,
    ));
    lines.push(line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        &["REQFLOW_DATABASE_TIMEOUT_SECS"],
        &file,
    ));
    lines.push(line(
        "server.bind_address",
        &config.server.bind_address,
        &["REQFLOW_SERVER_BIND_ADDRESS"],
        &file,
    ));
    lines.push(line(
        "server.api_port",
        &config.server.api_port.to_string(),
        &["REQFLOW_SERVER_API_PORT"],
        &file,
    ));
    lines.push(line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        &["REQFLOW_SERVER_HEALTH_CHECK_PORT"],
        &file,
    ));
    lines.push(line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        &["REQFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        &file,
    ));
    lines.push(line(
        "notifier.enabled",
        &config.notifier.enabled.to_string(),
        &["REQFLOW_NOTIFIER_ENABLED"],
        &file,
    ));
    lines.push(line(
        "notifier.webhook_url",
        config.notifier.webhook_url.as_deref().unwrap_or("(unset)"),
        &["REQFLOW_NOTIFIER_WEBHOOK_URL"],
        &file,
    ));
    let token = config
        .notifier
        .auth_token
        .as_ref()
        .map(|token| redact_token(token.expose_secret()))
        .unwrap_or_else(|| "(unset)".to_owned());
    lines.push(line("notifier.auth_token", &token, &["REQFLOW_NOTIFIER_AUTH_TOKEN"], &file));
    lines.push(line(
        "notifier.timeout_secs",
        &config.notifier.timeout_secs.to_string(),
        &["REQFLOW_NOTIFIER_TIMEOUT_SECS"],
        &file,
    ));
    lines.push(line(
        "logging.level",
        &config.logging.level,
        &["REQFLOW_LOGGING_LEVEL", "REQFLOW_LOG_LEVEL"],
        &file,
    ));
    let format = match config.logging.format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    };
    lines.push(line(
        "logging.format",
        format,
        &["REQFLOW_LOGGING_FORMAT", "REQFLOW_LOG_FORMAT"],
        &file,
    ));

    lines.push(CommandOutcome::ok("config", "configuration valid").render());
    CommandResult::success(lines.join("\n"))
}

fn line(
    key: &str,
    value: &str,
    env_keys: &[&str],
    file: &Option<(PathBuf, toml::Value)>,
) -> String {
    format!("- {key} = {value} (source: {})", field_source(key, env_keys, file))
}

fn field_source(
    key: &str,
    env_keys: &[&str],
    file: &Option<(PathBuf, toml::Value)>,
) -> String {
    for env_key in env_keys {
        if std::env::var(env_key).is_ok() {
            return format!("env({env_key})");
        }
    }
    if let Some((path, document)) = file {
        if contains_path(document, key) {
            return format!("file({})", path.display());
        }
    }
    "default".to_owned()
}

fn load_config_document() -> Option<(PathBuf, toml::Value)> {
    [Path::new("reqflow.toml"), Path::new("config/reqflow.toml")]
        .into_iter()
        .find(|path| path.exists())
        .and_then(|path| {
            let raw = std::fs::read_to_string(path).ok()?;
            let document = raw.parse::<toml::Value>().ok()?;
            Some((path.to_path_buf(), document))
        })
}

fn contains_path(document: &toml::Value, dotted_key: &str) -> bool {
    let mut current = document;
    for part in dotted_key.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{prefix}***")
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn dotted_keys_walk_nested_tables() {
        let document: toml::Value = "[database]\nurl = \"sqlite://reqflow.db\"\n"
            .parse()
            .expect("toml");

        assert!(contains_path(&document, "database.url"));
        assert!(!contains_path(&document, "database.max_connections"));
        assert!(!contains_path(&document, "notifier.enabled"));
    }

    #[test]
    fn tokens_keep_only_a_short_prefix() {
        assert_eq!(redact_token("sk-live-abcdef"), "sk-l***");
        assert_eq!(redact_token("ab"), "ab***");
    }
}
