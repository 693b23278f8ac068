use std::collections::BTreeMap;

use sqlx::Row;

use reqflow_core::{AuditCategory, AuditEvent, AuditOutcome, AuditSubject};

use super::{parse_timestamp, AuditLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditLogRepository {
    pool: DbPool,
}

impl SqlAuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let event_id: String =
        row.try_get("event_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let subject_kind: Option<String> =
        row.try_get("subject_kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let subject_id: Option<String> =
        row.try_get("subject_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let correlation_id: String =
        row.try_get("correlation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let event_type: String =
        row.try_get("event_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor: String =
        row.try_get("actor").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let outcome: String =
        row.try_get("outcome").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata: String =
        row.try_get("metadata").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occurred_at: String =
        row.try_get("occurred_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let subject = match (subject_kind, subject_id) {
        (Some(kind), Some(id)) => Some(AuditSubject { kind, id }),
        (None, None) => None,
        _ => {
            return Err(RepositoryError::Decode(
                "audit_event subject kind and id must be set together".to_owned(),
            ))
        }
    };

    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata)
        .map_err(|e| RepositoryError::Decode(format!("audit_event.metadata: {e}")))?;

    Ok(AuditEvent {
        event_id,
        subject,
        correlation_id,
        event_type,
        category: AuditCategory::parse(&category).ok_or_else(|| {
            RepositoryError::Decode(format!("audit_event.category: unknown value `{category}`"))
        })?,
        actor,
        outcome: AuditOutcome::parse(&outcome).ok_or_else(|| {
            RepositoryError::Decode(format!("audit_event.outcome: unknown value `{outcome}`"))
        })?,
        metadata,
        occurred_at: parse_timestamp("audit_event.occurred_at", &occurred_at)?,
    })
}

#[async_trait::async_trait]
impl AuditLogRepository for SqlAuditLogRepository {
    async fn append(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|e| RepositoryError::Decode(format!("audit_event.metadata: {e}")))?;

        sqlx::query(
            "INSERT INTO audit_event (event_id, subject_kind, subject_id, correlation_id,
                                      event_type, category, actor, outcome, metadata, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(event.subject.as_ref().map(|subject| subject.kind.as_str()))
        .bind(event.subject.as_ref().map(|subject| subject.id.as_str()))
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(event.category.as_str())
        .bind(&event.actor)
        .bind(event.outcome.as_str())
        .bind(metadata)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_subject(
        &self,
        kind: &str,
        id: &str,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT event_id, subject_kind, subject_id, correlation_id, event_type,
                    category, actor, outcome, metadata, occurred_at
             FROM audit_event
             WHERE subject_kind = ? AND subject_id = ?
             ORDER BY occurred_at ASC, event_id ASC",
        )
        .bind(kind)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

#[cfg(test)]
mod tests {
    use reqflow_core::{AuditCategory, AuditEvent, AuditOutcome, AuditSubject};

    use super::SqlAuditLogRepository;
    use crate::repositories::AuditLogRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn append_and_list_round_trips_metadata() {
        let pool = setup().await;
        let repo = SqlAuditLogRepository::new(pool);

        let event = AuditEvent::new(
            Some(AuditSubject::request("REQ-1")),
            "corr-1",
            "requests.decision_recorded",
            AuditCategory::Requests,
            "staff-gm",
            AuditOutcome::Success,
        )
        .with_metadata("decision", "approve")
        .with_metadata("stage", "general_manager");

        repo.append(&event).await.expect("append");
        let events = repo.list_for_subject("request", "REQ-1").await.expect("list");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0], event);
    }

    #[tokio::test]
    async fn rejected_attempts_are_kept_alongside_successes() {
        let pool = setup().await;
        let repo = SqlAuditLogRepository::new(pool);

        let denied = AuditEvent::new(
            Some(AuditSubject::request("REQ-2")),
            "corr-2",
            "requests.decision_recorded",
            AuditCategory::Requests,
            "staff-cashier",
            AuditOutcome::Rejected,
        )
        .with_metadata("error", "request is not waiting on Cashier");
        let success = AuditEvent::new(
            Some(AuditSubject::request("REQ-2")),
            "corr-3",
            "requests.decision_recorded",
            AuditCategory::Requests,
            "staff-gm",
            AuditOutcome::Success,
        );

        repo.append(&denied).await.expect("append denied");
        repo.append(&success).await.expect("append success");

        let events = repo.list_for_subject("request", "REQ-2").await.expect("list");
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|event| event.outcome == AuditOutcome::Rejected));
    }

    #[tokio::test]
    async fn system_events_without_a_subject_are_accepted() {
        let pool = setup().await;
        let repo = SqlAuditLogRepository::new(pool);

        let event = AuditEvent::new(
            None,
            "corr-4",
            "system.seed_loaded",
            AuditCategory::System,
            "cli",
            AuditOutcome::Success,
        );
        repo.append(&event).await.expect("append");

        let events = repo.list_for_subject("request", "REQ-none").await.expect("list");
        assert!(events.is_empty());
    }
}
