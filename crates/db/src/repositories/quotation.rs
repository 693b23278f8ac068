use sqlx::Row;

use reqflow_core::{Quotation, QuotationId, QuotationLine, QuotationStatus, SignatureStatus};

use super::{
    parse_decimal, parse_quantity, parse_revision, parse_timestamp, QuotationRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlQuotationRepository {
    pool: DbPool,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_lines(&self, quotation_id: &str) -> Result<Vec<QuotationLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT description, quantity, unit_price
             FROM quotation_line WHERE quotation_id = ? ORDER BY position ASC",
        )
        .bind(quotation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row_to_line(row, "quotation_line")).collect()
    }

    async fn hydrate(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Quotation, RepositoryError> {
        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let lines = self.load_lines(&id).await?;
        row_to_quotation(row, lines)
    }
}

pub(crate) fn row_to_line(
    row: &sqlx::sqlite::SqliteRow,
    table: &str,
) -> Result<QuotationLine, RepositoryError> {
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_price: String =
        row.try_get("unit_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(QuotationLine {
        description,
        quantity: parse_quantity(&format!("{table}.quantity"), quantity)?,
        unit_price: parse_decimal(&format!("{table}.unit_price"), &unit_price)?,
    })
}

fn row_to_quotation(
    row: &sqlx::sqlite::SqliteRow,
    lines: Vec<QuotationLine>,
) -> Result<Quotation, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_name: String =
        row.try_get("customer_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let agent_id: String =
        row.try_get("agent_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let signature_status: String =
        row.try_get("signature_status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let revision: i64 =
        row.try_get("revision").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Quotation {
        id: QuotationId(id),
        customer_name,
        agent_id,
        lines,
        status: QuotationStatus::parse(&status).ok_or_else(|| {
            RepositoryError::Decode(format!("quotation.status: unknown value `{status}`"))
        })?,
        signature_status: SignatureStatus::parse(&signature_status).ok_or_else(|| {
            RepositoryError::Decode(format!(
                "quotation.signature_status: unknown value `{signature_status}`"
            ))
        })?,
        revision: parse_revision("quotation.revision", revision)?,
        created_at: parse_timestamp("quotation.created_at", &created_at)?,
        updated_at: parse_timestamp("quotation.updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl QuotationRepository for SqlQuotationRepository {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, customer_name, agent_id, status, signature_status, revision,
                    created_at, updated_at
             FROM quotation WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(self.hydrate(r).await?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, quotation: &Quotation) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quotation (id, customer_name, agent_id, status, signature_status,
                                    revision, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&quotation.id.0)
        .bind(&quotation.customer_name)
        .bind(&quotation.agent_id)
        .bind(quotation.status.as_str())
        .bind(quotation.signature_status.as_str())
        .bind(i64::from(quotation.revision))
        .bind(quotation.created_at.to_rfc3339())
        .bind(quotation.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, line) in quotation.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO quotation_line (quotation_id, position, description, quantity, unit_price)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&quotation.id.0)
            .bind(position as i64)
            .bind(&line.description)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // Lines are fixed at drafting time, so only the scalar columns move.
    async fn update(&self, quotation: &Quotation) -> Result<Quotation, RepositoryError> {
        let next_revision = quotation.revision + 1;

        let result = sqlx::query(
            "UPDATE quotation
             SET status = ?, signature_status = ?, revision = ?, updated_at = ?
             WHERE id = ? AND revision = ?",
        )
        .bind(quotation.status.as_str())
        .bind(quotation.signature_status.as_str())
        .bind(i64::from(next_revision))
        .bind(quotation.updated_at.to_rfc3339())
        .bind(&quotation.id.0)
        .bind(i64::from(quotation.revision))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM quotation WHERE id = ?)")
                    .bind(&quotation.id.0)
                    .fetch_one(&self.pool)
                    .await?;
            return Err(if exists == 1 {
                RepositoryError::Conflict {
                    entity: "quotation",
                    id: quotation.id.0.clone(),
                    expected_revision: quotation.revision,
                }
            } else {
                RepositoryError::NotFound(format!("quotation {}", quotation.id.0))
            });
        }

        let mut stored = quotation.clone();
        stored.revision = next_revision;
        Ok(stored)
    }

    async fn list(
        &self,
        status: Option<QuotationStatus>,
    ) -> Result<Vec<Quotation>, RepositoryError> {
        let rows = if let Some(status) = status {
            sqlx::query(
                "SELECT id, customer_name, agent_id, status, signature_status, revision,
                        created_at, updated_at
                 FROM quotation WHERE status = ? ORDER BY created_at ASC, id ASC",
            )
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, customer_name, agent_id, status, signature_status, revision,
                        created_at, updated_at
                 FROM quotation ORDER BY created_at ASC, id ASC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        let mut quotations = Vec::with_capacity(rows.len());
        for row in &rows {
            quotations.push(self.hydrate(row).await?);
        }
        Ok(quotations)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use reqflow_core::sales::{create_quotation, submit_for_approval, NewQuotation};
    use reqflow_core::{Principal, Quotation, QuotationLine, QuotationStatus, Role, SignatureStatus};

    use super::SqlQuotationRepository;
    use crate::repositories::{QuotationRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn agent() -> Principal {
        Principal {
            user_id: "staff-agent".to_owned(),
            name: "staff-agent".to_owned(),
            email: "agent@example.com".to_owned(),
            role: Role::SalesAgent,
        }
    }

    fn draft() -> Quotation {
        create_quotation(
            NewQuotation {
                customer_name: "Acme Distribution".to_owned(),
                lines: vec![QuotationLine {
                    description: "Point-of-sale terminal".to_owned(),
                    quantity: 3,
                    unit_price: Decimal::new(250_00, 2),
                }],
            },
            &agent(),
            Utc::now(),
        )
        .expect("draft quotation")
    }

    #[tokio::test]
    async fn insert_and_find_round_trips_lines() {
        let pool = setup().await;
        let repo = SqlQuotationRepository::new(pool);
        let quotation = draft();

        repo.insert(&quotation).await.expect("insert");
        let found = repo.find_by_id(&quotation.id).await.expect("find").expect("exists");

        assert_eq!(found, quotation);
        assert_eq!(found.total(), Decimal::new(750_00, 2));
    }

    #[tokio::test]
    async fn update_is_revision_checked() {
        let pool = setup().await;
        let repo = SqlQuotationRepository::new(pool);
        let quotation = draft();
        repo.insert(&quotation).await.expect("insert");

        let mut first = repo.find_by_id(&quotation.id).await.expect("find").expect("exists");
        let mut second = first.clone();

        submit_for_approval(&mut first, &agent(), Utc::now()).expect("submit");
        let stored = repo.update(&first).await.expect("first write wins");
        assert_eq!(stored.revision, 1);

        submit_for_approval(&mut second, &agent(), Utc::now()).expect("submit stale copy");
        let error = repo.update(&second).await.expect_err("stale write loses");
        assert!(matches!(error, RepositoryError::Conflict { entity: "quotation", .. }));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let pool = setup().await;
        let repo = SqlQuotationRepository::new(pool);

        let mut sent = draft();
        sent.status = QuotationStatus::Sent;
        sent.signature_status = SignatureStatus::Pending;
        repo.insert(&sent).await.expect("insert sent");
        repo.insert(&draft()).await.expect("insert draft");

        let drafts = repo.list(Some(QuotationStatus::Draft)).await.expect("list drafts");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].status, QuotationStatus::Draft);

        let all = repo.list(None).await.expect("list all");
        assert_eq!(all.len(), 2);
    }
}
