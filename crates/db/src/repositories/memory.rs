//! In-memory repositories for tests and the CLI smoke path. They keep the
//! same revision-checked write contract as the Sql implementations, so
//! callers observe identical conflict behaviour either way.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use reqflow_core::{
    AuditEvent, ChainPolicy, Order, OrderId, OrderStatus, Quotation, QuotationId,
    QuotationStatus, Request, RequestId, Role, StaffMember,
};

use super::{
    AuditLogRepository, ChainPolicyRepository, OrderRepository, QuotationRepository,
    RepositoryError, RequestFilter, RequestRepository, StaffRepository,
};

#[derive(Clone, Default)]
pub struct InMemoryRequestRepository {
    requests: Arc<RwLock<HashMap<String, Request>>>,
}

#[async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        Ok(self.requests.read().await.get(&id.0).cloned())
    }

    async fn insert(&self, request: &Request) -> Result<(), RepositoryError> {
        self.requests.write().await.insert(request.id.0.clone(), request.clone());
        Ok(())
    }

    async fn update(&self, request: &Request) -> Result<Request, RepositoryError> {
        let mut requests = self.requests.write().await;
        let existing = requests
            .get(&request.id.0)
            .ok_or_else(|| RepositoryError::NotFound(format!("request {}", request.id.0)))?;
        if existing.revision != request.revision {
            return Err(RepositoryError::Conflict {
                entity: "request",
                id: request.id.0.clone(),
                expected_revision: request.revision,
            });
        }

        let mut stored = request.clone();
        stored.revision = request.revision + 1;
        requests.insert(request.id.0.clone(), stored.clone());
        Ok(stored)
    }

    async fn list(&self, filter: RequestFilter) -> Result<Vec<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matching: Vec<Request> = requests
            .values()
            .filter(|request| {
                filter.status.is_none_or(|status| request.status == status)
                    && filter.request_type.is_none_or(|rt| request.request_type == rt)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(matching)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryQuotationRepository {
    quotations: Arc<RwLock<HashMap<String, Quotation>>>,
}

#[async_trait]
impl QuotationRepository for InMemoryQuotationRepository {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        Ok(self.quotations.read().await.get(&id.0).cloned())
    }

    async fn insert(&self, quotation: &Quotation) -> Result<(), RepositoryError> {
        self.quotations.write().await.insert(quotation.id.0.clone(), quotation.clone());
        Ok(())
    }

    async fn update(&self, quotation: &Quotation) -> Result<Quotation, RepositoryError> {
        let mut quotations = self.quotations.write().await;
        let existing = quotations
            .get(&quotation.id.0)
            .ok_or_else(|| RepositoryError::NotFound(format!("quotation {}", quotation.id.0)))?;
        if existing.revision != quotation.revision {
            return Err(RepositoryError::Conflict {
                entity: "quotation",
                id: quotation.id.0.clone(),
                expected_revision: quotation.revision,
            });
        }

        let mut stored = quotation.clone();
        stored.revision = quotation.revision + 1;
        quotations.insert(quotation.id.0.clone(), stored.clone());
        Ok(stored)
    }

    async fn list(
        &self,
        status: Option<QuotationStatus>,
    ) -> Result<Vec<Quotation>, RepositoryError> {
        let quotations = self.quotations.read().await;
        let mut matching: Vec<Quotation> = quotations
            .values()
            .filter(|quotation| status.is_none_or(|status| quotation.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(matching)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.get(&id.0).cloned())
    }

    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        self.orders.write().await.insert(order.id.0.clone(), order.clone());
        Ok(())
    }

    async fn update(&self, order: &Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        let existing = orders
            .get(&order.id.0)
            .ok_or_else(|| RepositoryError::NotFound(format!("sales_order {}", order.id.0)))?;
        if existing.revision != order.revision {
            return Err(RepositoryError::Conflict {
                entity: "sales_order",
                id: order.id.0.clone(),
                expected_revision: order.revision,
            });
        }

        let mut stored = order.clone();
        stored.revision = order.revision + 1;
        orders.insert(order.id.0.clone(), stored.clone());
        Ok(stored)
    }

    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| status.is_none_or(|status| order.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(matching)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStaffRepository {
    members: Arc<RwLock<HashMap<String, StaffMember>>>,
}

impl InMemoryStaffRepository {
    pub async fn with_members(members: Vec<StaffMember>) -> Self {
        let repo = Self::default();
        {
            let mut map = repo.members.write().await;
            for member in members {
                map.insert(member.id.clone(), member);
            }
        }
        repo
    }
}

#[async_trait]
impl StaffRepository for InMemoryStaffRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<StaffMember>, RepositoryError> {
        Ok(self.members.read().await.get(id).cloned())
    }

    async fn upsert(&self, member: &StaffMember) -> Result<(), RepositoryError> {
        self.members.write().await.insert(member.id.clone(), member.clone());
        Ok(())
    }

    async fn list_active_by_role(&self, role: Role) -> Result<Vec<StaffMember>, RepositoryError> {
        let members = self.members.read().await;
        let mut matching: Vec<StaffMember> = members
            .values()
            .filter(|member| member.role == role && member.active)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }
}

#[derive(Clone)]
pub struct InMemoryChainPolicyRepository {
    policy: ChainPolicy,
}

impl Default for InMemoryChainPolicyRepository {
    fn default() -> Self {
        Self { policy: ChainPolicy::builtin() }
    }
}

impl InMemoryChainPolicyRepository {
    pub fn with_policy(policy: ChainPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ChainPolicyRepository for InMemoryChainPolicyRepository {
    async fn load_latest(&self) -> Result<ChainPolicy, RepositoryError> {
        Ok(self.policy.clone())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditLogRepository {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl InMemoryAuditLogRepository {
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn append(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn list_for_subject(
        &self,
        kind: &str,
        id: &str,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|event| {
                event
                    .subject
                    .as_ref()
                    .is_some_and(|subject| subject.kind == kind && subject.id == id)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use reqflow_core::requests::{decide, submit, Decision, NewRequest};
    use reqflow_core::{ChainPolicy, Principal, Request, RequestStatus, RequestType, Role};

    use super::InMemoryRequestRepository;
    use crate::repositories::{RepositoryError, RequestFilter, RequestRepository};

    fn principal(user_id: &str, role: Role) -> Principal {
        Principal {
            user_id: user_id.to_owned(),
            name: user_id.to_owned(),
            email: format!("{user_id}@example.com"),
            role,
        }
    }

    fn submitted_cash() -> Request {
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
            Utc::now(),
        )
        .expect("submit");
        request
    }

    #[tokio::test]
    async fn conflict_semantics_match_the_sql_store() {
        let repo = InMemoryRequestRepository::default();
        let request = submitted_cash();
        repo.insert(&request).await.expect("insert");

        let mut first = repo.find_by_id(&request.id).await.expect("find").expect("exists");
        let mut second = first.clone();

        let gm = principal("staff-gm", Role::GeneralManager);
        decide(&mut first, &gm, Decision::Approve, Utc::now()).expect("first decision");
        let stored = repo.update(&first).await.expect("first write wins");
        assert_eq!(stored.revision, 1);

        decide(&mut second, &gm, Decision::Reject, Utc::now()).expect("second decision");
        let error = repo.update(&second).await.expect_err("stale write loses");
        assert!(matches!(error, RepositoryError::Conflict { expected_revision: 0, .. }));

        let found = repo.find_by_id(&request.id).await.expect("find").expect("exists");
        assert_eq!(found.status, RequestStatus::Pending);
        assert_eq!(found.revision, 1);
    }

    #[tokio::test]
    async fn list_is_ordered_and_filtered() {
        let repo = InMemoryRequestRepository::default();
        let request = submitted_cash();
        repo.insert(&request).await.expect("insert");

        let pending = repo
            .list(RequestFilter { status: Some(RequestStatus::Pending), ..RequestFilter::default() })
            .await
            .expect("list");
        assert_eq!(pending.len(), 1);

        let material = repo
            .list(RequestFilter {
                request_type: Some(RequestType::Material),
                ..RequestFilter::default()
            })
            .await
            .expect("list");
        assert!(material.is_empty());
    }
}
