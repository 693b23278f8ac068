use sqlx::Row;

use reqflow_core::{
    ApprovalStep, Request, RequestId, RequestItem, RequestStatus, RequestType, StepStatus,
};

use super::{
    parse_date, parse_decimal, parse_quantity, parse_revision, parse_role, parse_timestamp,
    RepositoryError, RequestFilter, RequestRepository,
};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, request_id: &str) -> Result<Vec<RequestItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT name, quantity, unit, unit_cost
             FROM request_item WHERE request_id = ? ORDER BY position ASC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_item).collect()
    }

    async fn load_trail(&self, request_id: &str) -> Result<Vec<ApprovalStep>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT role, status, actor, decided_at
             FROM approval_step WHERE request_id = ? ORDER BY position ASC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_step).collect()
    }

    async fn hydrate(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Request, RepositoryError> {
        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let items = self.load_items(&id).await?;
        let trail = self.load_trail(&id).await?;
        row_to_request(row, items, trail)
    }
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<RequestItem, RepositoryError> {
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit: String = row.try_get("unit").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_cost: Option<String> =
        row.try_get("unit_cost").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(RequestItem {
        name,
        quantity: parse_quantity("request_item.quantity", quantity)?,
        unit,
        unit_cost: unit_cost
            .map(|value| parse_decimal("request_item.unit_cost", &value))
            .transpose()?,
    })
}

fn row_to_step(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalStep, RepositoryError> {
    let role: String = row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor: Option<String> =
        row.try_get("actor").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let decided_at: Option<String> =
        row.try_get("decided_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ApprovalStep {
        role: parse_role("approval_step.role", &role)?,
        status: StepStatus::parse(&status).ok_or_else(|| {
            RepositoryError::Decode(format!("approval_step.status: unknown value `{status}`"))
        })?,
        actor,
        decided_at: decided_at
            .map(|value| parse_timestamp("approval_step.decided_at", &value))
            .transpose()?,
    })
}

fn row_to_request(
    row: &sqlx::sqlite::SqliteRow,
    items: Vec<RequestItem>,
    trail: Vec<ApprovalStep>,
) -> Result<Request, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let request_type: String =
        row.try_get("request_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let reason: String =
        row.try_get("reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let amount: String =
        row.try_get("amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let current_stage: Option<String> =
        row.try_get("current_stage").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_by: String =
        row.try_get("created_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let creator_role: String =
        row.try_get("creator_role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let needed_by: Option<String> =
        row.try_get("needed_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let delivery_location: Option<String> =
        row.try_get("delivery_location").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let revision: i64 =
        row.try_get("revision").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Request {
        id: RequestId(id),
        request_type: RequestType::parse(&request_type).ok_or_else(|| {
            RepositoryError::Decode(format!("request.request_type: unknown value `{request_type}`"))
        })?,
        title,
        reason,
        amount: parse_decimal("request.amount", &amount)?,
        items,
        status: RequestStatus::parse(&status).ok_or_else(|| {
            RepositoryError::Decode(format!("request.status: unknown value `{status}`"))
        })?,
        current_stage: current_stage
            .map(|value| parse_role("request.current_stage", &value))
            .transpose()?,
        trail,
        created_by,
        creator_role: parse_role("request.creator_role", &creator_role)?,
        needed_by: needed_by.map(|value| parse_date("request.needed_by", &value)).transpose()?,
        delivery_location,
        revision: parse_revision("request.revision", revision)?,
        created_at: parse_timestamp("request.created_at", &created_at)?,
        updated_at: parse_timestamp("request.updated_at", &updated_at)?,
    })
}

async fn write_trail(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    request_id: &str,
    trail: &[ApprovalStep],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM approval_step WHERE request_id = ?")
        .bind(request_id)
        .execute(&mut **tx)
        .await?;

    for (position, step) in trail.iter().enumerate() {
        sqlx::query(
            "INSERT INTO approval_step (request_id, position, role, status, actor, decided_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(request_id)
        .bind(position as i64)
        .bind(step.role.as_str())
        .bind(step.status.as_str())
        .bind(&step.actor)
        .bind(step.decided_at.map(|at| at.to_rfc3339()))
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, request_type, title, reason, amount, status, current_stage,
                    created_by, creator_role, needed_by, delivery_location, revision,
                    created_at, updated_at
             FROM request WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(self.hydrate(r).await?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, request: &Request) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO request (id, request_type, title, reason, amount, status,
                                  current_stage, created_by, creator_role, needed_by,
                                  delivery_location, revision, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(request.request_type.as_str())
        .bind(&request.title)
        .bind(&request.reason)
        .bind(request.amount.to_string())
        .bind(request.status.as_str())
        .bind(request.current_stage.map(|role| role.as_str()))
        .bind(&request.created_by)
        .bind(request.creator_role.as_str())
        .bind(request.needed_by.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(&request.delivery_location)
        .bind(i64::from(request.revision))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, item) in request.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO request_item (request_id, position, name, quantity, unit, unit_cost)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&request.id.0)
            .bind(position as i64)
            .bind(&item.name)
            .bind(i64::from(item.quantity))
            .bind(&item.unit)
            .bind(item.unit_cost.map(|cost| cost.to_string()))
            .execute(&mut *tx)
            .await?;
        }

        write_trail(&mut tx, &request.id.0, &request.trail).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, request: &Request) -> Result<Request, RepositoryError> {
        let next_revision = request.revision + 1;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE request
             SET status = ?, current_stage = ?, revision = ?, updated_at = ?
             WHERE id = ? AND revision = ?",
        )
        .bind(request.status.as_str())
        .bind(request.current_stage.map(|role| role.as_str()))
        .bind(i64::from(next_revision))
        .bind(request.updated_at.to_rfc3339())
        .bind(&request.id.0)
        .bind(i64::from(request.revision))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM request WHERE id = ?)")
                    .bind(&request.id.0)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists == 1 {
                RepositoryError::Conflict {
                    entity: "request",
                    id: request.id.0.clone(),
                    expected_revision: request.revision,
                }
            } else {
                RepositoryError::NotFound(format!("request {}", request.id.0))
            });
        }

        write_trail(&mut tx, &request.id.0, &request.trail).await?;

        tx.commit().await?;

        let mut stored = request.clone();
        stored.revision = next_revision;
        Ok(stored)
    }

    async fn list(&self, filter: RequestFilter) -> Result<Vec<Request>, RepositoryError> {
        let mut sql = String::from(
            "SELECT id, request_type, title, reason, amount, status, current_stage,
                    created_by, creator_role, needed_by, delivery_location, revision,
                    created_at, updated_at
             FROM request",
        );
        let mut clauses: Vec<&str> = Vec::new();
        if filter.status.is_some() {
            clauses.push("status = ?");
        }
        if filter.request_type.is_some() {
            clauses.push("request_type = ?");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(request_type) = filter.request_type {
            query = query.bind(request_type.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut requests = Vec::with_capacity(rows.len());
        for row in &rows {
            requests.push(self.hydrate(row).await?);
        }
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use reqflow_core::requests::{decide, submit, Decision, NewRequest};
    use reqflow_core::{
        ChainPolicy, Principal, Request, RequestId, RequestItem, RequestStatus, RequestType, Role,
        StepStatus,
    };

    use super::SqlRequestRepository;
    use crate::repositories::{RepositoryError, RequestFilter, RequestRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn principal(user_id: &str, role: Role) -> Principal {
        Principal {
            user_id: user_id.to_owned(),
            name: user_id.to_owned(),
            email: format!("{user_id}@example.com"),
            role,
        }
    }

    fn submitted_material() -> Request {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let (request, _) = submit(
            NewRequest {
                request_type: RequestType::Material,
                title: "Field laptops".to_owned(),
                reason: "Replacements for the survey team".to_owned(),
                amount: None,
                items: vec![RequestItem {
                    name: "Laptop".to_owned(),
                    quantity: 2,
                    unit: "pcs".to_owned(),
                    unit_cost: Some(Decimal::new(1_000_00, 2)),
                }],
                needed_by: None,
                delivery_location: Some("Main store".to_owned()),
            },
            &principal("staff-employee", Role::Employee),
            &ChainPolicy::builtin(),
            now,
        )
        .expect("submit");
        request
    }

    fn submitted_cash() -> Request {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
        let (request, _) = submit(
            NewRequest {
                request_type: RequestType::Cash,
                title: "Fuel float".to_owned(),
                reason: "Delivery van refuels".to_owned(),
                amount: Some(Decimal::new(150_00, 2)),
                items: Vec::new(),
                needed_by: None,
                delivery_location: None,
            },
            &principal("staff-employee", Role::Employee),
            &ChainPolicy::builtin(),
            now,
        )
        .expect("submit");
        request
    }

    #[tokio::test]
    async fn insert_and_find_round_trips_items_and_trail() {
        let pool = setup().await;
        let repo = SqlRequestRepository::new(pool);
        let request = submitted_material();

        repo.insert(&request).await.expect("insert");
        let found = repo.find_by_id(&request.id).await.expect("find").expect("exists");

        assert_eq!(found, request);
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.trail.len(), 4);
        assert_eq!(found.trail[0].status, StepStatus::Approved);
        assert_eq!(found.amount, Decimal::new(2_000_00, 2));
    }

    #[tokio::test]
    async fn update_bumps_the_revision_and_rewrites_the_trail() {
        let pool = setup().await;
        let repo = SqlRequestRepository::new(pool);
        let mut request = submitted_cash();
        repo.insert(&request).await.expect("insert");

        decide(&mut request, &principal("staff-gm", Role::GeneralManager), Decision::Approve, Utc::now())
            .expect("gm approves");
        let stored = repo.update(&request).await.expect("update");

        assert_eq!(stored.revision, 1);
        let found = repo.find_by_id(&request.id).await.expect("find").expect("exists");
        assert_eq!(found.revision, 1);
        assert_eq!(found.trail[1].status, StepStatus::Approved);
        assert_eq!(found.current_stage, Some(Role::ManagingDirector));
    }

    #[tokio::test]
    async fn stale_snapshots_are_refused_with_a_conflict() {
        let pool = setup().await;
        let repo = SqlRequestRepository::new(pool);
        let request = submitted_cash();
        repo.insert(&request).await.expect("insert");

        // Two readers take the same revision-0 snapshot.
        let mut first = repo.find_by_id(&request.id).await.expect("find").expect("exists");
        let mut second = first.clone();

        decide(&mut first, &principal("staff-gm", Role::GeneralManager), Decision::Approve, Utc::now())
            .expect("first decision");
        repo.update(&first).await.expect("first write wins");

        decide(&mut second, &principal("staff-gm", Role::GeneralManager), Decision::Reject, Utc::now())
            .expect("second decision");
        let error = repo.update(&second).await.expect_err("second write loses");

        assert!(matches!(
            error,
            RepositoryError::Conflict { entity: "request", expected_revision: 0, .. }
        ));

        // The losing write left nothing behind.
        let found = repo.find_by_id(&request.id).await.expect("find").expect("exists");
        assert_eq!(found.status, RequestStatus::Pending);
        assert_eq!(found.trail[1].status, StepStatus::Approved);
    }

    #[tokio::test]
    async fn updating_a_missing_request_reports_not_found() {
        let pool = setup().await;
        let repo = SqlRequestRepository::new(pool);
        let mut request = submitted_cash();
        request.id = RequestId("REQ-missing".to_owned());

        let error = repo.update(&request).await.expect_err("missing row");
        assert!(matches!(error, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_by_status_and_type() {
        let pool = setup().await;
        let repo = SqlRequestRepository::new(pool);

        let cash = submitted_cash();
        let material = submitted_material();
        repo.insert(&cash).await.expect("insert cash");
        repo.insert(&material).await.expect("insert material");

        let all = repo.list(RequestFilter::default()).await.expect("list all");
        assert_eq!(all.len(), 2);
        // Deterministic order: earliest created_at first.
        assert_eq!(all[0].id, material.id);

        let only_cash = repo
            .list(RequestFilter { request_type: Some(RequestType::Cash), ..RequestFilter::default() })
            .await
            .expect("list cash");
        assert_eq!(only_cash.len(), 1);
        assert_eq!(only_cash[0].id, cash.id);

        let approved = repo
            .list(RequestFilter { status: Some(RequestStatus::Approved), ..RequestFilter::default() })
            .await
            .expect("list approved");
        assert!(approved.is_empty());
    }
}
