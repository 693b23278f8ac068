//! End-to-end smoke checks: configuration, schema, a full requisition
//! lifecycle against the in-memory store, and export determinism. A
//! failing check skips the ones after it.

use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use reqflow_core::config::{AppConfig, LoadOptions};
use reqflow_core::export::requests_to_csv;
use reqflow_core::requests::{decide, issue, submit, Decision, IssueOutcome, NewRequest};
use reqflow_core::{ChainPolicy, Principal, Request, RequestStatus, RequestType, Role};
use reqflow_db::repositories::{InMemoryRequestRepository, RequestRepository};
use reqflow_db::{connect_with_settings, migrations};

use super::{CommandResult, EXIT_VERIFICATION};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SmokeStatus {
    Pass,
    Fail,
    Skip,
}

#[derive(Debug, Serialize)]
pub struct SmokeCheck {
    pub name: &'static str,
    pub status: SmokeStatus,
    pub elapsed_ms: u64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SmokeReport {
    pub command: &'static str,
    pub checks: Vec<SmokeCheck>,
}

impl SmokeReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.status == SmokeStatus::Pass)
    }
}

pub async fn run() -> CommandResult {
    let mut report = SmokeReport { command: "smoke", checks: Vec::new() };

    push(&mut report, "config_validation", check_config()).await;
    push(&mut report, "migration_visibility", check_migrations()).await;
    push(&mut report, "requisition_lifecycle", check_lifecycle()).await;
    push(&mut report, "export_determinism", check_export()).await;

    let mut lines: Vec<String> = report
        .checks
        .iter()
        .map(|check| {
            let status = match check.status {
                SmokeStatus::Pass => "pass",
                SmokeStatus::Fail => "fail",
                SmokeStatus::Skip => "skip",
            };
            format!("- [{status}] {} ({} ms): {}", check.name, check.elapsed_ms, check.message)
        })
        .collect();
    lines.push(serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_owned()));
    let output = lines.join("\n");

    if report.passed() {
        CommandResult::success(output)
    } else {
        CommandResult::failure(EXIT_VERIFICATION, output)
    }
}

async fn push<F>(report: &mut SmokeReport, name: &'static str, run: F)
where
    F: Future<Output = Result<String, String>>,
{
    if report.checks.iter().any(|check| check.status == SmokeStatus::Fail) {
        report.checks.push(SmokeCheck {
            name,
            status: SmokeStatus::Skip,
            elapsed_ms: 0,
            message: "skipped after an earlier failure".to_owned(),
        });
        return;
    }

    let started = Instant::now();
    let (status, message) = match run.await {
        Ok(message) => (SmokeStatus::Pass, message),
        Err(message) => (SmokeStatus::Fail, message),
    };
    report.checks.push(SmokeCheck {
        name,
        status,
        elapsed_ms: started.elapsed().as_millis() as u64,
        message,
    });
}

async fn check_config() -> Result<String, String> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| error.to_string())?;
    Ok(format!("configuration valid (database {})", config.database.url))
}

/// Runs the full migration set against a scratch database; the configured
/// one is never touched.
async fn check_migrations() -> Result<String, String> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| error.to_string())?;
    migrations::run_pending(&pool).await.map_err(|error| error.to_string())?;

    let objects: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM sqlite_master WHERE type IN ('table', 'index')",
    )
    .fetch_one(&pool)
    .await
    .map_err(|error| error.to_string())?;
    pool.close().await;

    Ok(format!("{objects} schema objects after migration"))
}

async fn check_lifecycle() -> Result<String, String> {
    let request = issued_cash_request().await?;
    if request.status != RequestStatus::Issued {
        return Err(format!("expected issued, found {:?}", request.status));
    }
    if request.approvals_recorded() != 4 {
        return Err(format!(
            "expected 4 recorded approvals, found {}",
            request.approvals_recorded()
        ));
    }
    Ok(format!("cash requisition issued after {} approvals", request.approvals_recorded()))
}

async fn check_export() -> Result<String, String> {
    let request = issued_cash_request().await?;
    let first = requests_to_csv(std::slice::from_ref(&request))
        .map_err(|error| error.to_string())?;
    let second = requests_to_csv(std::slice::from_ref(&request))
        .map_err(|error| error.to_string())?;

    if first != second {
        return Err("two exports of the same data differ".to_owned());
    }
    Ok(format!("export is deterministic ({} bytes)", first.len()))
}

async fn issued_cash_request() -> Result<Request, String> {
    let employee = principal("smoke-employee", Role::Employee);
    let policy = ChainPolicy::builtin();

    let (request, _) = submit(
        NewRequest {
            request_type: RequestType::Cash,
            title: "Smoke test float".to_owned(),
            reason: "Exercising the approval chain".to_owned(),
            amount: Some(Decimal::new(100_00, 2)),
            items: Vec::new(),
            needed_by: None,
            delivery_location: None,
        },
        &employee,
        &policy,
        Utc::now(),
    )
    .map_err(|error| error.to_string())?;

    let repo = InMemoryRequestRepository::default();
    repo.insert(&request).await.map_err(|error| error.to_string())?;
    let mut working = repo
        .find_by_id(&request.id)
        .await
        .map_err(|error| error.to_string())?
        .ok_or_else(|| "inserted request not found".to_owned())?;

    for approver in [
        principal("smoke-gm", Role::GeneralManager),
        principal("smoke-md", Role::ManagingDirector),
    ] {
        decide(&mut working, &approver, Decision::Approve, Utc::now())
            .map_err(|error| error.to_string())?;
        working = repo.update(&working).await.map_err(|error| error.to_string())?;
    }

    let cashier = principal("smoke-cashier", Role::Cashier);
    match issue(&mut working, &cashier, Utc::now()).map_err(|error| error.to_string())? {
        IssueOutcome::Finalized { .. } => {
            working = repo.update(&working).await.map_err(|error| error.to_string())?;
        }
        IssueOutcome::AlreadyFinal => {
            return Err("request finalized before issuance".to_owned());
        }
    }

    Ok(working)
}

fn principal(user_id: &str, role: Role) -> Principal {
    Principal {
        user_id: user_id.to_owned(),
        name: user_id.to_owned(),
        email: format!("{user_id}@example.com"),
        role,
    }
}
