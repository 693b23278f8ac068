//! Deterministic demo dataset used by the CLI `seed` command and e2e tests.

use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_STAFF_IDS: &[&str] = &[
    "staff-employee",
    "staff-agent",
    "staff-executive",
    "staff-gm",
    "staff-md",
    "staff-ed",
    "staff-cashier",
    "staff-store",
];

const SEED_REQUEST_IDS: &[&str] = &["REQ-SEED-CASH-001", "REQ-SEED-MAT-001"];
const SEED_QUOTATION_IDS: &[&str] = &["QUO-SEED-001", "QUO-SEED-002"];
const SEED_ORDER_IDS: &[&str] = &["ORD-SEED-001"];

/// Seed contract: one staff member per role, a cash requisition waiting on
/// the general manager, a material requisition waiting on issuance, a draft
/// quotation, and a signed quotation with its order awaiting payment.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    /// Loads the dataset. The script uses INSERT OR REPLACE throughout, so
    /// reloading over an already-seeded database is safe.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            staff_seeded: SEED_STAFF_IDS.len(),
            requests_seeded: SEED_REQUEST_IDS.len(),
            quotations_seeded: SEED_QUOTATION_IDS.len(),
            orders_seeded: SEED_ORDER_IDS.len(),
        })
    }

    /// Verifies that every seeded record is present in its expected state.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let staff_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM staff WHERE id IN {}",
            sql_array_from_ids(SEED_STAFF_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("staff-directory", staff_count == SEED_STAFF_IDS.len() as i64));

        let distinct_roles: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(DISTINCT role) FROM staff WHERE id IN {}",
            sql_array_from_ids(SEED_STAFF_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("staff-one-per-role", distinct_roles == SEED_STAFF_IDS.len() as i64));

        let cash_pending: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM request
             WHERE id = 'REQ-SEED-CASH-001' AND status = 'pending'
               AND current_stage = 'general_manager')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("cash-request-pending-at-gm", cash_pending == 1));

        let cash_trail: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM approval_step WHERE request_id = 'REQ-SEED-CASH-001'",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("cash-request-trail", cash_trail == 4));

        let material_awaiting_issue: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM request
             WHERE id = 'REQ-SEED-MAT-001' AND status = 'approved'
               AND current_stage = 'store_manager')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("material-request-awaiting-issuance", material_awaiting_issue == 1));

        let material_items: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM request_item WHERE request_id = 'REQ-SEED-MAT-001'",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("material-request-items", material_items == 1));

        let draft_quotation: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM quotation
             WHERE id = 'QUO-SEED-001' AND status = 'draft'
               AND signature_status = 'not_requested')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("draft-quotation", draft_quotation == 1));

        let signed_quotation: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM quotation
             WHERE id = 'QUO-SEED-002' AND status = 'accepted'
               AND signature_status = 'signed')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("signed-quotation", signed_quotation == 1));

        let order_awaiting_payment: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sales_order
             WHERE id = 'ORD-SEED-001' AND quotation_id = 'QUO-SEED-002'
               AND status = 'awaiting_payment')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("order-awaiting-payment", order_awaiting_payment == 1));

        let order_lines_match: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sales_order_line sol
             JOIN quotation_line ql ON ql.quotation_id = 'QUO-SEED-002'
               AND ql.position = sol.position
             WHERE sol.order_id = 'ORD-SEED-001'
               AND sol.description = ql.description
               AND sol.quantity = ql.quantity
               AND sol.unit_price = ql.unit_price)",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("order-lines-copied-verbatim", order_lines_match == 1));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded records from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let orders = sql_array_from_ids(SEED_ORDER_IDS);
        let quotations = sql_array_from_ids(SEED_QUOTATION_IDS);
        let requests = sql_array_from_ids(SEED_REQUEST_IDS);
        let staff = sql_array_from_ids(SEED_STAFF_IDS);

        sqlx::query(&format!("DELETE FROM sales_order_line WHERE order_id IN {orders}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM sales_order WHERE id IN {orders}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM quotation_line WHERE quotation_id IN {quotations}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM quotation WHERE id IN {quotations}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM approval_step WHERE request_id IN {requests}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM request_item WHERE request_id IN {requests}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM request WHERE id IN {requests}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM staff WHERE id IN {staff}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub staff_seeded: usize,
    pub requests_seeded: usize,
    pub quotations_seeded: usize,
    pub orders_seeded: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::SeedDataset;
    use crate::repositories::{RequestFilter, RequestRepository, SqlRequestRepository};
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_not_empty() {
        assert!(!SeedDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn load_verify_and_reload_are_stable() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let first = SeedDataset::load(&pool).await.expect("first load");
        assert_eq!(first.staff_seeded, 8);
        let first_verification = SeedDataset::verify(&pool).await.expect("first verify");
        assert!(first_verification.all_present, "checks: {:?}", first_verification.checks);

        let second = SeedDataset::load(&pool).await.expect("reload");
        assert_eq!(second.requests_seeded, 2);
        let second_verification = SeedDataset::verify(&pool).await.expect("second verify");
        assert!(second_verification.all_present);
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn seeded_requests_decode_through_the_repository() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SeedDataset::load(&pool).await.expect("load");

        let repo = SqlRequestRepository::new(pool);
        let requests = repo.list(RequestFilter::default()).await.expect("list");

        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert_eq!(request.trail.len(), 4);
        }
    }

    #[tokio::test]
    async fn clean_removes_every_seeded_record() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SeedDataset::load(&pool).await.expect("load");

        SeedDataset::clean(&pool).await.expect("clean");

        let verification = SeedDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        let leftover: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM request")
            .fetch_one(&pool)
            .await
            .expect("count requests");
        assert_eq!(leftover, 0);
    }
}
