//! Handler dependencies. Everything is behind a trait object so the same
//! router runs against the Sql stores in production and the in-memory
//! stores in tests.

use std::sync::Arc;

use reqflow_core::{ApplicationError, ChainPolicy};
use reqflow_db::repositories::{
    AuditLogRepository, ChainPolicyRepository, OrderRepository, QuotationRepository,
    RequestRepository, SqlAuditLogRepository, SqlChainPolicyRepository, SqlOrderRepository,
    SqlQuotationRepository, SqlRequestRepository, SqlStaffRepository, StaffRepository,
};
use reqflow_db::DbPool;
use reqflow_notify::NotificationSink;

use crate::documents::DocumentRenderer;

#[derive(Clone)]
pub struct AppState {
    pub requests: Arc<dyn RequestRepository>,
    pub quotations: Arc<dyn QuotationRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub staff: Arc<dyn StaffRepository>,
    pub audit: Arc<dyn AuditLogRepository>,
    /// Loaded once at startup; chain edits ship as a new policy version
    /// and take effect on restart.
    pub policy: ChainPolicy,
    pub notifier: Arc<dyn NotificationSink>,
    pub documents: Arc<DocumentRenderer>,
}

impl AppState {
    /// Production wiring over a migrated pool.
    pub async fn from_pool(
        pool: DbPool,
        notifier: Arc<dyn NotificationSink>,
        documents: Arc<DocumentRenderer>,
    ) -> Result<Self, ApplicationError> {
        let policy = SqlChainPolicyRepository::new(pool.clone())
            .load_latest()
            .await
            .map_err(ApplicationError::from)?;

        Ok(Self {
            requests: Arc::new(SqlRequestRepository::new(pool.clone())),
            quotations: Arc::new(SqlQuotationRepository::new(pool.clone())),
            orders: Arc::new(SqlOrderRepository::new(pool.clone())),
            staff: Arc::new(SqlStaffRepository::new(pool.clone())),
            audit: Arc::new(SqlAuditLogRepository::new(pool)),
            policy,
            notifier,
            documents,
        })
    }
}
