use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::role::Role;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("REQ-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Cash,
    Material,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Material => "material",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Some(Self::Cash),
            "material" => Some(Self::Material),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Issued,
    Delivered,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Issued => "issued",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "issued" => Some(Self::Issued),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Issued and Delivered are the two fulfilment end states.
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Issued | Self::Delivered)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Issued | Self::Delivered | Self::Cancelled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// One slot in the approval trail. Slots are created up front when the
/// request is submitted and filled in as roles act, so the trail always
/// shows the full chain, decided and undecided alike.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub role: Role,
    pub status: StepStatus,
    pub actor: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalStep {
    pub fn pending(role: Role) -> Self {
        Self { role, status: StepStatus::Pending, actor: None, decided_at: None }
    }

    pub fn approved_by(role: Role, actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { role, status: StepStatus::Approved, actor: Some(actor.into()), decided_at: Some(at) }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestItem {
    pub name: String,
    pub quantity: u32,
    pub unit: String,
    pub unit_cost: Option<Decimal>,
}

impl RequestItem {
    /// Quantity times unit cost; an unpriced item contributes zero.
    pub fn line_total(&self) -> Decimal {
        self.unit_cost.map(|cost| cost * Decimal::from(self.quantity)).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub request_type: RequestType,
    pub title: String,
    pub reason: String,
    /// Requested cash amount, or the derived total of the item lines for
    /// material requests.
    pub amount: Decimal,
    pub items: Vec<RequestItem>,
    pub status: RequestStatus,
    pub current_stage: Option<Role>,
    pub trail: Vec<ApprovalStep>,
    pub created_by: String,
    pub creator_role: Role,
    pub needed_by: Option<NaiveDate>,
    pub delivery_location: Option<String>,
    /// Optimistic-concurrency token; bumped by the store on every write.
    pub revision: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Request {
    /// Index of the earliest pending trail slot, if any.
    pub fn current_step_index(&self) -> Option<usize> {
        self.trail.iter().position(|step| step.status == StepStatus::Pending)
    }

    pub fn items_total(items: &[RequestItem]) -> Decimal {
        items.iter().map(RequestItem::line_total).sum()
    }

    pub fn approvals_recorded(&self) -> usize {
        self.trail.iter().filter(|step| step.status == StepStatus::Approved).count()
    }
}
