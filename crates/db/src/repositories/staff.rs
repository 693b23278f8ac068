use sqlx::Row;

use reqflow_core::{Role, StaffMember};

use super::{parse_role, RepositoryError, StaffRepository};
use crate::DbPool;

pub struct SqlStaffRepository {
    pool: DbPool,
}

impl SqlStaffRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_member(row: &sqlx::sqlite::SqliteRow) -> Result<StaffMember, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String =
        row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role: String = row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let active: i64 =
        row.try_get("active").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(StaffMember {
        id,
        name,
        email,
        role: parse_role("staff.role", &role)?,
        active: active != 0,
    })
}

#[async_trait::async_trait]
impl StaffRepository for SqlStaffRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<StaffMember>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, role, active FROM staff WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_member(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, member: &StaffMember) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO staff (id, name, email, role, active)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 role = excluded.role,
                 active = excluded.active",
        )
        .bind(&member.id)
        .bind(&member.name)
        .bind(&member.email)
        .bind(member.role.as_str())
        .bind(i64::from(member.active))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_active_by_role(&self, role: Role) -> Result<Vec<StaffMember>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, email, role, active
             FROM staff WHERE role = ? AND active = 1 ORDER BY id ASC",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_member).collect()
    }
}

#[cfg(test)]
mod tests {
    use reqflow_core::{Role, StaffMember};

    use super::SqlStaffRepository;
    use crate::repositories::StaffRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn member(id: &str, role: Role, active: bool) -> StaffMember {
        StaffMember {
            id: id.to_owned(),
            name: id.to_owned(),
            email: format!("{id}@example.com"),
            role,
            active,
        }
    }

    #[tokio::test]
    async fn upsert_and_find_round_trips() {
        let pool = setup().await;
        let repo = SqlStaffRepository::new(pool);

        repo.upsert(&member("staff-gm", Role::GeneralManager, true)).await.expect("upsert");
        let found = repo.find_by_id("staff-gm").await.expect("find").expect("exists");

        assert_eq!(found.role, Role::GeneralManager);
        assert!(found.active);
    }

    #[tokio::test]
    async fn upsert_replaces_on_conflict() {
        let pool = setup().await;
        let repo = SqlStaffRepository::new(pool);

        repo.upsert(&member("staff-1", Role::Employee, true)).await.expect("insert");
        repo.upsert(&member("staff-1", Role::Employee, false)).await.expect("deactivate");

        let found = repo.find_by_id("staff-1").await.expect("find").expect("exists");
        assert!(!found.active);
    }

    #[tokio::test]
    async fn role_listing_skips_inactive_members() {
        let pool = setup().await;
        let repo = SqlStaffRepository::new(pool);

        repo.upsert(&member("staff-c1", Role::Cashier, true)).await.expect("upsert");
        repo.upsert(&member("staff-c2", Role::Cashier, false)).await.expect("upsert");
        repo.upsert(&member("staff-gm", Role::GeneralManager, true)).await.expect("upsert");

        let cashiers = repo.list_active_by_role(Role::Cashier).await.expect("list");
        assert_eq!(cashiers.len(), 1);
        assert_eq!(cashiers[0].id, "staff-c1");
    }
}
