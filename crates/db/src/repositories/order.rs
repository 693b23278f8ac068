use sqlx::Row;

use reqflow_core::{Order, OrderId, OrderStatus, QuotationId, QuotationLine};

use super::quotation::row_to_line;
use super::{parse_revision, parse_timestamp, OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_lines(&self, order_id: &str) -> Result<Vec<QuotationLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT description, quantity, unit_price
             FROM sales_order_line WHERE order_id = ? ORDER BY position ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row_to_line(row, "sales_order_line")).collect()
    }

    async fn hydrate(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Order, RepositoryError> {
        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let lines = self.load_lines(&id).await?;
        row_to_order(row, lines)
    }
}

fn row_to_order(
    row: &sqlx::sqlite::SqliteRow,
    lines: Vec<QuotationLine>,
) -> Result<Order, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quotation_id: String =
        row.try_get("quotation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let customer_name: String =
        row.try_get("customer_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let agent_id: String =
        row.try_get("agent_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let revision: i64 =
        row.try_get("revision").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Order {
        id: OrderId(id),
        quotation_id: QuotationId(quotation_id),
        customer_name,
        agent_id,
        lines,
        status: OrderStatus::parse(&status).ok_or_else(|| {
            RepositoryError::Decode(format!("sales_order.status: unknown value `{status}`"))
        })?,
        revision: parse_revision("sales_order.revision", revision)?,
        created_at: parse_timestamp("sales_order.created_at", &created_at)?,
        updated_at: parse_timestamp("sales_order.updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, quotation_id, customer_name, agent_id, status, revision,
                    created_at, updated_at
             FROM sales_order WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(self.hydrate(r).await?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sales_order (id, quotation_id, customer_name, agent_id, status,
                                      revision, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.quotation_id.0)
        .bind(&order.customer_name)
        .bind(&order.agent_id)
        .bind(order.status.as_str())
        .bind(i64::from(order.revision))
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO sales_order_line (order_id, position, description, quantity, unit_price)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&order.id.0)
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

    async fn update(&self, order: &Order) -> Result<Order, RepositoryError> {
        let next_revision = order.revision + 1;

        let result = sqlx::query(
            "UPDATE sales_order
             SET status = ?, revision = ?, updated_at = ?
             WHERE id = ? AND revision = ?",
        )
        .bind(order.status.as_str())
        .bind(i64::from(next_revision))
        .bind(order.updated_at.to_rfc3339())
        .bind(&order.id.0)
        .bind(i64::from(order.revision))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sales_order WHERE id = ?)")
                    .bind(&order.id.0)
                    .fetch_one(&self.pool)
                    .await?;
            return Err(if exists == 1 {
                RepositoryError::Conflict {
                    entity: "sales_order",
                    id: order.id.0.clone(),
                    expected_revision: order.revision,
                }
            } else {
                RepositoryError::NotFound(format!("sales_order {}", order.id.0))
            });
        }

        let mut stored = order.clone();
        stored.revision = next_revision;
        Ok(stored)
    }

    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError> {
        let rows = if let Some(status) = status {
            sqlx::query(
                "SELECT id, quotation_id, customer_name, agent_id, status, revision,
                        created_at, updated_at
                 FROM sales_order WHERE status = ? ORDER BY created_at ASC, id ASC",
            )
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, quotation_id, customer_name, agent_id, status, revision,
                        created_at, updated_at
                 FROM sales_order ORDER BY created_at ASC, id ASC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }
}
