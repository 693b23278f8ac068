use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use reqflow_core::{
    ApplicationError, AuditEvent, ChainPolicy, Order, OrderId, OrderStatus, Quotation,
    QuotationId, QuotationStatus, Request, RequestId, RequestStatus, RequestType, Role,
    StaffMember,
};

pub mod audit;
pub mod chain_policy;
pub mod memory;
pub mod order;
pub mod quotation;
pub mod request;
pub mod staff;

pub use audit::SqlAuditLogRepository;
pub use chain_policy::SqlChainPolicyRepository;
pub use memory::{
    InMemoryAuditLogRepository, InMemoryChainPolicyRepository, InMemoryOrderRepository,
    InMemoryQuotationRepository, InMemoryRequestRepository, InMemoryStaffRepository,
};
pub use order::SqlOrderRepository;
pub use quotation::SqlQuotationRepository;
pub use request::SqlRequestRepository;
pub use staff::SqlStaffRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{entity} {id} changed concurrently (expected revision {expected_revision})")]
    Conflict { entity: &'static str, id: String, expected_revision: u32 },
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(message) => Self::NotFound(message),
            conflict @ RepositoryError::Conflict { .. } => Self::Conflict(conflict.to_string()),
            RepositoryError::Database(error) => Self::Persistence(error.to_string()),
            RepositoryError::Decode(message) => Self::Persistence(message),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub request_type: Option<RequestType>,
}

/// Requisition store. `update` is a compare-and-swap on the revision carried
/// by the passed snapshot: the row is written with revision + 1 only if the
/// stored revision still matches, otherwise the call fails with `Conflict`.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError>;
    async fn insert(&self, request: &Request) -> Result<(), RepositoryError>;
    async fn update(&self, request: &Request) -> Result<Request, RepositoryError>;
    async fn list(&self, filter: RequestFilter) -> Result<Vec<Request>, RepositoryError>;
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError>;
    async fn insert(&self, quotation: &Quotation) -> Result<(), RepositoryError>;
    async fn update(&self, quotation: &Quotation) -> Result<Quotation, RepositoryError>;
    async fn list(&self, status: Option<QuotationStatus>)
        -> Result<Vec<Quotation>, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError>;
    async fn update(&self, order: &Order) -> Result<Order, RepositoryError>;
    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError>;
}

#[async_trait]
pub trait StaffRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<StaffMember>, RepositoryError>;
    async fn upsert(&self, member: &StaffMember) -> Result<(), RepositoryError>;
    async fn list_active_by_role(&self, role: Role) -> Result<Vec<StaffMember>, RepositoryError>;
}

#[async_trait]
pub trait ChainPolicyRepository: Send + Sync {
    /// Loads the highest-version chain table.
    async fn load_latest(&self) -> Result<ChainPolicy, RepositoryError>;
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<(), RepositoryError>;
    async fn list_for_subject(
        &self,
        kind: &str,
        id: &str,
    ) -> Result<Vec<AuditEvent>, RepositoryError>;
}

// Decode helpers shared by the Sql* repositories. Stored enum values are a
// closed set; anything unrecognised is a decode failure, never a default.

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

pub(crate) fn parse_date(column: &str, value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

pub(crate) fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    value
        .parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

pub(crate) fn parse_role(column: &str, value: &str) -> Result<Role, RepositoryError> {
    Role::parse(value)
        .ok_or_else(|| RepositoryError::Decode(format!("{column}: unknown role `{value}`")))
}

pub(crate) fn parse_revision(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column}: revision {value} out of range")))
}

pub(crate) fn parse_quantity(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column}: quantity {value} out of range")))
}
