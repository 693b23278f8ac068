use sqlx::Row;

use reqflow_core::{ChainPolicy, RequestType, Role};

use super::{parse_role, ChainPolicyRepository, RepositoryError};
use crate::DbPool;

pub struct SqlChainPolicyRepository {
    pool: DbPool,
}

impl SqlChainPolicyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChainPolicyRepository for SqlChainPolicyRepository {
    async fn load_latest(&self) -> Result<ChainPolicy, RepositoryError> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM chain_policy")
            .fetch_one(&self.pool)
            .await?;
        let version = version
            .ok_or_else(|| RepositoryError::Decode("chain_policy table is empty".to_owned()))?;

        let rows = sqlx::query(
            "SELECT request_type, role FROM chain_policy
             WHERE version = ? ORDER BY request_type ASC, position ASC",
        )
        .bind(version)
        .fetch_all(&self.pool)
        .await?;

        let mut cash: Vec<Role> = Vec::new();
        let mut material: Vec<Role> = Vec::new();
        for row in &rows {
            let request_type: String =
                row.try_get("request_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let role: String =
                row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let role = parse_role("chain_policy.role", &role)?;

            match RequestType::parse(&request_type) {
                Some(RequestType::Cash) => cash.push(role),
                Some(RequestType::Material) => material.push(role),
                None => {
                    return Err(RepositoryError::Decode(format!(
                        "chain_policy.request_type: unknown value `{request_type}`"
                    )))
                }
            }
        }

        let version = u32::try_from(version).map_err(|_| {
            RepositoryError::Decode(format!("chain_policy.version {version} out of range"))
        })?;
        ChainPolicy::from_table(version, cash, material)
            .map_err(|error| RepositoryError::Decode(error.to_string()))
    }
}
