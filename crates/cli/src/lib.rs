//! Operational command line for reqflow. Every command prints a
//! machine-readable outcome on its last line, so scripts can parse results
//! without scraping human text.

pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

const AFTER_HELP: &str = "Examples:
  reqflow migrate                 apply pending schema migrations
  reqflow seed                    load and verify the demo dataset
  reqflow smoke                   run the end-to-end smoke checks
  reqflow config                  print effective configuration with sources
  reqflow doctor --json           machine-readable environment diagnosis";

#[derive(Debug, Parser)]
#[command(
    name = "reqflow",
    about = "Requisition approval and sales pipeline service",
    after_help = AFTER_HELP
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate configuration and database connectivity without serving.
    Start,
    /// Apply pending schema migrations.
    Migrate,
    /// Load the deterministic demo dataset and verify it.
    Seed,
    /// Run the end-to-end smoke checks.
    Smoke,
    /// Print the effective configuration and where each value came from.
    Config,
    /// Diagnose configuration, database, and notifier readiness.
    Doctor {
        /// Emit the report as JSON instead of human-readable lines.
        #[arg(long)]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    run_command(cli.command)
}

pub fn run_command(command: Command) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("failed to initialize async runtime: {error}");
            return ExitCode::from(commands::EXIT_RUNTIME_INIT);
        }
    };

    let result = runtime.block_on(async {
        match command {
            Command::Start => commands::start::run().await,
            Command::Migrate => commands::migrate::run().await,
            Command::Seed => commands::seed::run().await,
            Command::Smoke => commands::smoke::run().await,
            Command::Config => commands::config::run().await,
            Command::Doctor { json } => commands::doctor::run(json).await,
        }
    });

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
