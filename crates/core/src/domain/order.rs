use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::quotation::{QuotationId, QuotationLine};
use crate::errors::SalesError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(format!("ORD-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingPayment,
    Processing,
    Shipped,
    Delivered,
    /// Legacy value carried by imported records; no transition produces it.
    Pending,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingPayment => "awaiting_payment",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "awaiting_payment" => Some(Self::AwaitingPayment),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "pending" => Some(Self::Pending),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A confirmed sale, always created from an accepted quotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub quotation_id: QuotationId,
    pub customer_name: String,
    pub agent_id: String,
    /// Copied verbatim from the source quotation at creation time; never
    /// re-derived or re-priced afterwards.
    pub lines: Vec<QuotationLine>,
    pub status: OrderStatus,
    pub revision: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(QuotationLine::line_total).sum()
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (&self.status, next),
            (OrderStatus::AwaitingPayment, OrderStatus::Processing)
                | (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (OrderStatus::AwaitingPayment, OrderStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), SalesError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(SalesError::InvalidOrderTransition { from: self.status, to: next })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{Order, OrderId, OrderStatus};
    use crate::domain::quotation::{QuotationId, QuotationLine};
    use crate::errors::SalesError;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId("ORD-1".to_owned()),
            quotation_id: QuotationId("QUO-1".to_owned()),
            customer_name: "Acme Distribution".to_owned(),
            agent_id: "staff-agent".to_owned(),
            lines: vec![QuotationLine {
                description: "Receipt printer".to_owned(),
                quantity: 2,
                unit_price: Decimal::new(120_00, 2),
            }],
            status,
            revision: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fulfilment_advances_one_stage_at_a_time() {
        let mut order = order(OrderStatus::AwaitingPayment);
        order.transition_to(OrderStatus::Processing).expect("payment received");
        order.transition_to(OrderStatus::Shipped).expect("shipped");
        order.transition_to(OrderStatus::Delivered).expect("delivered");

        assert_eq!(order.status, OrderStatus::Delivered);
    }

    #[test]
    fn unpaid_orders_cannot_ship() {
        let mut order = order(OrderStatus::AwaitingPayment);
        let error = order.transition_to(OrderStatus::Shipped).expect_err("skip payment");

        assert!(matches!(error, SalesError::InvalidOrderTransition { .. }));
        assert_eq!(order.status, OrderStatus::AwaitingPayment);
    }

    #[test]
    fn cancellation_is_only_open_before_payment() {
        assert!(order(OrderStatus::AwaitingPayment).can_transition_to(OrderStatus::Cancelled));
        assert!(!order(OrderStatus::Processing).can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn legacy_pending_status_still_decodes() {
        assert_eq!(OrderStatus::parse("pending"), Some(OrderStatus::Pending));
        assert!(!order(OrderStatus::Pending).can_transition_to(OrderStatus::Processing));
    }
}
