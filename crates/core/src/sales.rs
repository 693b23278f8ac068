//! Sales pipeline coordinator: quotation lifecycle, order creation, and
//! order fulfilment.
//!
//! Same contract as the requisition engine: operations are pure, mutate the
//! passed entity, and hand back notification intents for the caller to
//! dispatch once the write has committed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::quotation::{
    Quotation, QuotationId, QuotationLine, QuotationStatus, SignatureStatus,
};
use crate::domain::role::{Principal, Role};
use crate::errors::SalesError;

/// Roles allowed to turn an accepted quotation into an order.
pub const SALE_APPROVER_ROLES: [Role; 3] =
    [Role::ManagingDirector, Role::ExecutiveDirector, Role::GeneralManager];

/// Roles allowed to originate quotations.
const QUOTING_ROLES: [Role; 2] = [Role::SalesAgent, Role::SalesExecutive];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SalesEvent {
    QuotationAwaitingApproval,
    QuotationSent,
    QuotationAccepted,
    QuotationDeclined,
    OrderCreated,
    PaymentReceived,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SalesFollowup {
    NotifyRole { role: Role, event: SalesEvent },
    NotifyUser { user_id: String, event: SalesEvent },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewQuotation {
    pub customer_name: String,
    pub lines: Vec<QuotationLine>,
}

/// Drafts a new quotation owned by the acting agent.
pub fn create_quotation(
    input: NewQuotation,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Quotation, SalesError> {
    if !QUOTING_ROLES.contains(&principal.role) {
        return Err(SalesError::NotPermitted {
            role: principal.role,
            action: "create a quotation",
        });
    }
    let customer_name = input.customer_name.trim();
    if customer_name.is_empty() {
        return Err(SalesError::Validation("customer name must not be blank".to_owned()));
    }
    if input.lines.is_empty() {
        return Err(SalesError::Validation("a quotation needs at least one line".to_owned()));
    }
    for line in &input.lines {
        if line.description.trim().is_empty() {
            return Err(SalesError::Validation("every line needs a description".to_owned()));
        }
        if line.quantity == 0 {
            return Err(SalesError::Validation(
                "line quantities must be at least one".to_owned(),
            ));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(SalesError::Validation("unit prices cannot be negative".to_owned()));
        }
    }

    Ok(Quotation {
        id: QuotationId::generate(),
        customer_name: customer_name.to_owned(),
        agent_id: principal.user_id.clone(),
        lines: input.lines,
        status: QuotationStatus::Draft,
        signature_status: SignatureStatus::NotRequested,
        revision: 0,
        created_at: now,
        updated_at: now,
    })
}

/// Draft -> PendingApproval, by the originating agent.
pub fn submit_for_approval(
    quotation: &mut Quotation,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Vec<SalesFollowup>, SalesError> {
    ensure_originating_agent(quotation, principal, "submit a quotation for approval")?;
    quotation.transition_to(QuotationStatus::PendingApproval)?;
    quotation.updated_at = now;

    Ok(vec![SalesFollowup::NotifyRole {
        role: Role::SalesExecutive,
        event: SalesEvent::QuotationAwaitingApproval,
    }])
}

/// PendingApproval -> Sent, by a sales executive. Marks the customer
/// signature as outstanding.
pub fn mark_sent(
    quotation: &mut Quotation,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Vec<SalesFollowup>, SalesError> {
    if principal.role != Role::SalesExecutive {
        return Err(SalesError::NotPermitted {
            role: principal.role,
            action: "release a quotation to the customer",
        });
    }
    quotation.transition_to(QuotationStatus::Sent)?;
    quotation.signature_status = SignatureStatus::Pending;
    quotation.updated_at = now;

    Ok(vec![SalesFollowup::NotifyUser {
        user_id: quotation.agent_id.clone(),
        event: SalesEvent::QuotationSent,
    }])
}

/// Sent -> Accepted, recorded by the originating agent once the customer
/// signs.
pub fn record_acceptance(
    quotation: &mut Quotation,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Vec<SalesFollowup>, SalesError> {
    ensure_originating_agent(quotation, principal, "record customer acceptance")?;
    quotation.transition_to(QuotationStatus::Accepted)?;
    quotation.signature_status = SignatureStatus::Signed;
    quotation.updated_at = now;

    Ok(vec![SalesFollowup::NotifyRole {
        role: Role::SalesExecutive,
        event: SalesEvent::QuotationAccepted,
    }])
}

/// Sent -> Declined, recorded by the originating agent.
pub fn record_decline(
    quotation: &mut Quotation,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Vec<SalesFollowup>, SalesError> {
    ensure_originating_agent(quotation, principal, "record customer decline")?;
    quotation.transition_to(QuotationStatus::Declined)?;
    quotation.updated_at = now;

    Ok(vec![SalesFollowup::NotifyRole {
        role: Role::SalesExecutive,
        event: SalesEvent::QuotationDeclined,
    }])
}

/// Turns an accepted quotation into an order awaiting payment. The
/// quotation itself is left untouched; its lines are copied verbatim.
pub fn approve_sale(
    quotation: &Quotation,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<(Order, Vec<SalesFollowup>), SalesError> {
    if !SALE_APPROVER_ROLES.contains(&principal.role) {
        return Err(SalesError::NotPermitted { role: principal.role, action: "approve a sale" });
    }
    if quotation.status != QuotationStatus::Accepted {
        return Err(SalesError::QuotationNotAccepted {
            id: quotation.id.clone(),
            status: quotation.status,
        });
    }

    let order = Order {
        id: OrderId::generate(),
        quotation_id: quotation.id.clone(),
        customer_name: quotation.customer_name.clone(),
        agent_id: quotation.agent_id.clone(),
        lines: quotation.lines.clone(),
        status: OrderStatus::AwaitingPayment,
        revision: 0,
        created_at: now,
        updated_at: now,
    };
    let followups = vec![
        SalesFollowup::NotifyUser {
            user_id: quotation.agent_id.clone(),
            event: SalesEvent::OrderCreated,
        },
        SalesFollowup::NotifyRole { role: Role::Cashier, event: SalesEvent::OrderCreated },
    ];
    Ok((order, followups))
}

/// AwaitingPayment -> Processing, recorded by the cashier. Payment receipt
/// is always a person's action, never an automatic consequence.
pub fn receive_payment(
    order: &mut Order,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Vec<SalesFollowup>, SalesError> {
    if principal.role != Role::Cashier {
        return Err(SalesError::NotPermitted {
            role: principal.role,
            action: "record a customer payment",
        });
    }
    order.transition_to(OrderStatus::Processing)?;
    order.updated_at = now;

    Ok(vec![SalesFollowup::NotifyUser {
        user_id: order.agent_id.clone(),
        event: SalesEvent::PaymentReceived,
    }])
}

/// Processing -> Shipped, by the store manager.
pub fn mark_shipped(
    order: &mut Order,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Vec<SalesFollowup>, SalesError> {
    if principal.role != Role::StoreManager {
        return Err(SalesError::NotPermitted { role: principal.role, action: "ship an order" });
    }
    order.transition_to(OrderStatus::Shipped)?;
    order.updated_at = now;

    Ok(vec![SalesFollowup::NotifyUser {
        user_id: order.agent_id.clone(),
        event: SalesEvent::OrderShipped,
    }])
}

/// Shipped -> Delivered, by the store manager.
pub fn mark_delivered(
    order: &mut Order,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Vec<SalesFollowup>, SalesError> {
    if principal.role != Role::StoreManager {
        return Err(SalesError::NotPermitted {
            role: principal.role,
            action: "mark an order delivered",
        });
    }
    order.transition_to(OrderStatus::Delivered)?;
    order.updated_at = now;

    Ok(vec![SalesFollowup::NotifyUser {
        user_id: order.agent_id.clone(),
        event: SalesEvent::OrderDelivered,
    }])
}

/// AwaitingPayment -> Cancelled, by management.
pub fn cancel_order(
    order: &mut Order,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Vec<SalesFollowup>, SalesError> {
    if !matches!(principal.role, Role::ManagingDirector | Role::GeneralManager) {
        return Err(SalesError::NotPermitted { role: principal.role, action: "cancel an order" });
    }
    order.transition_to(OrderStatus::Cancelled)?;
    order.updated_at = now;

    Ok(vec![SalesFollowup::NotifyUser {
        user_id: order.agent_id.clone(),
        event: SalesEvent::OrderCancelled,
    }])
}

fn ensure_originating_agent(
    quotation: &Quotation,
    principal: &Principal,
    action: &'static str,
) -> Result<(), SalesError> {
    if principal.user_id != quotation.agent_id {
        return Err(SalesError::NotOriginatingAgent { action });
    }
    Ok(())
}
