use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SalesError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub String);

impl QuotationId {
    pub fn generate() -> Self {
        Self(format!("QUO-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    PendingApproval,
    Sent,
    Accepted,
    Declined,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending_approval" => Some(Self::PendingApproval),
            "sent" => Some(Self::Sent),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

/// Where the customer signature stands. Tracking only; reqflow stores the
/// status, it does not collect signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    NotRequested,
    Pending,
    Signed,
}

impl SignatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequested => "not_requested",
            Self::Pending => "pending",
            Self::Signed => "signed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "not_requested" => Some(Self::NotRequested),
            "pending" => Some(Self::Pending),
            "signed" => Some(Self::Signed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuotationLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl QuotationLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub customer_name: String,
    /// Staff id of the originating sales agent; agent-gated transitions
    /// compare against this.
    pub agent_id: String,
    pub lines: Vec<QuotationLine>,
    pub status: QuotationStatus,
    pub signature_status: SignatureStatus,
    pub revision: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(QuotationLine::line_total).sum()
    }

    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        matches!(
            (&self.status, next),
            (QuotationStatus::Draft, QuotationStatus::PendingApproval)
                | (QuotationStatus::PendingApproval, QuotationStatus::Sent)
                | (QuotationStatus::Sent, QuotationStatus::Accepted)
                | (QuotationStatus::Sent, QuotationStatus::Declined)
        )
    }

    pub fn transition_to(&mut self, next: QuotationStatus) -> Result<(), SalesError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(SalesError::InvalidQuotationTransition { from: self.status, to: next })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{Quotation, QuotationId, QuotationLine, QuotationStatus, SignatureStatus};
    use crate::errors::SalesError;

    fn quotation(status: QuotationStatus) -> Quotation {
        Quotation {
            id: QuotationId("QUO-1".to_owned()),
            customer_name: "Acme Distribution".to_owned(),
            agent_id: "staff-agent".to_owned(),
            lines: vec![QuotationLine {
                description: "Point-of-sale terminal".to_owned(),
                quantity: 3,
                unit_price: Decimal::new(250_00, 2),
            }],
            status,
            signature_status: SignatureStatus::NotRequested,
            revision: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn allows_the_forward_pipeline_transitions() {
        let mut quotation = quotation(QuotationStatus::Draft);
        quotation.transition_to(QuotationStatus::PendingApproval).expect("draft -> pending");
        quotation.transition_to(QuotationStatus::Sent).expect("pending -> sent");
        quotation.transition_to(QuotationStatus::Accepted).expect("sent -> accepted");

        assert_eq!(quotation.status, QuotationStatus::Accepted);
    }

    #[test]
    fn blocks_skipping_the_approval_stage() {
        let mut quotation = quotation(QuotationStatus::Draft);
        let error = quotation.transition_to(QuotationStatus::Sent).expect_err("draft -> sent");

        assert!(matches!(error, SalesError::InvalidQuotationTransition { .. }));
        assert_eq!(quotation.status, QuotationStatus::Draft);
    }

    #[test]
    fn declined_is_terminal() {
        let mut quotation = quotation(QuotationStatus::Declined);
        assert!(!quotation.can_transition_to(QuotationStatus::Sent));
        assert!(quotation.transition_to(QuotationStatus::Accepted).is_err());
    }

    #[test]
    fn total_sums_line_totals() {
        let quotation = quotation(QuotationStatus::Draft);
        assert_eq!(quotation.total(), Decimal::new(750_00, 2));
    }
}
