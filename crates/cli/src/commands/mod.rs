//! Command implementations. Each returns a [`CommandResult`] whose output
//! ends with a one-line JSON summary (a [`CommandOutcome`], or the full
//! report for `smoke` and `doctor --json`); the exit code is the process
//! exit code.

pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;
pub mod smoke;
pub mod start;

use serde::Serialize;

pub const EXIT_CONFIG_VALIDATION: u8 = 2;
pub const EXIT_RUNTIME_INIT: u8 = 3;
pub const EXIT_DB_CONNECTIVITY: u8 = 4;
pub const EXIT_EXECUTION: u8 = 5;
pub const EXIT_VERIFICATION: u8 = 6;

#[derive(Debug)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }

    pub fn failure(exit_code: u8, output: impl Into<String>) -> Self {
        Self { exit_code, output: output.into() }
    }
}

/// The machine-readable last line every command prints.
#[derive(Debug, Serialize)]
pub struct CommandOutcome {
    pub command: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<&'static str>,
    pub message: String,
}

impl CommandOutcome {
    pub fn ok(command: &'static str, message: impl Into<String>) -> Self {
        Self { command, status: "ok", error_class: None, message: message.into() }
    }

    pub fn failed(
        command: &'static str,
        error_class: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self { command, status: "failed", error_class: Some(error_class), message: message.into() }
    }

    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}
