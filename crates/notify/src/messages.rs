//! Pure message builders. Each takes the workflow event and the subject
//! entity as it stands after the write, and renders the text shown to the
//! recipient. No sink or I/O concerns here.

use reqflow_core::{Order, Quotation, Request, RequestEvent, SalesEvent};

use crate::{Notification, NotificationKind};

/// Renders a requisition event for one recipient.
pub fn request_notification(
    recipient_id: &str,
    event: RequestEvent,
    request: &Request,
) -> Notification {
    let id = &request.id.0;
    let (kind, title, body) = match event {
        RequestEvent::Submitted => (
            NotificationKind::RequestSubmitted,
            format!("Requisition {id} awaits your review"),
            format!(
                "{} submitted \"{}\" ({} for {}).",
                request.created_by,
                request.title,
                request.request_type.as_str(),
                request.amount
            ),
        ),
        RequestEvent::StageAdvanced => (
            NotificationKind::RequestStageAdvanced,
            format!("Requisition {id} reached your stage"),
            format!("\"{}\" is now waiting on {}.", request.title, waiting_stage(request)),
        ),
        RequestEvent::FullyApproved => (
            NotificationKind::RequestApproved,
            format!("Requisition {id} fully approved"),
            format!(
                "\"{}\" has every decision approval and awaits issuance by {}.",
                request.title,
                waiting_stage(request)
            ),
        ),
        RequestEvent::Rejected => (
            NotificationKind::RequestRejected,
            format!("Requisition {id} rejected"),
            format!("\"{}\" was rejected during review.", request.title),
        ),
        RequestEvent::Issued => (
            NotificationKind::RequestIssued,
            format!("Requisition {id} issued"),
            format!("The cash for \"{}\" has been issued.", request.title),
        ),
        RequestEvent::Delivered => (
            NotificationKind::RequestDelivered,
            format!("Requisition {id} delivered"),
            format!("The items for \"{}\" have been delivered.", request.title),
        ),
        RequestEvent::Cancelled => (
            NotificationKind::RequestCancelled,
            format!("Requisition {id} cancelled"),
            format!("\"{}\" was withdrawn by its creator.", request.title),
        ),
    };

    Notification {
        recipient_id: recipient_id.to_owned(),
        kind,
        title,
        body,
        link: Some(format!("/api/v1/requests/{id}")),
    }
}

/// Renders a quotation event for one recipient. Order-only events fall to
/// a generic update line so the builder stays total over `SalesEvent`.
pub fn quotation_notification(
    recipient_id: &str,
    event: SalesEvent,
    quotation: &Quotation,
) -> Notification {
    let id = &quotation.id.0;
    let (title, body) = match event {
        SalesEvent::QuotationAwaitingApproval => (
            format!("Quotation {id} awaits approval"),
            format!(
                "{} submitted a quotation for {} totalling {}.",
                quotation.agent_id,
                quotation.customer_name,
                quotation.total()
            ),
        ),
        SalesEvent::QuotationSent => (
            format!("Quotation {id} sent"),
            format!("The quotation for {} has gone out to the customer.", quotation.customer_name),
        ),
        SalesEvent::QuotationAccepted => (
            format!("Quotation {id} accepted"),
            format!(
                "{} accepted the quotation totalling {}.",
                quotation.customer_name,
                quotation.total()
            ),
        ),
        SalesEvent::QuotationDeclined => (
            format!("Quotation {id} declined"),
            format!("{} declined the quotation.", quotation.customer_name),
        ),
        _ => (
            format!("Update on quotation {id}"),
            format!("The quotation for {} changed state.", quotation.customer_name),
        ),
    };

    Notification {
        recipient_id: recipient_id.to_owned(),
        kind: sales_kind(event),
        title,
        body,
        link: Some(format!("/api/v1/quotations/{id}")),
    }
}

/// Renders an order event for one recipient. Quotation-only events fall to
/// a generic update line.
pub fn order_notification(recipient_id: &str, event: SalesEvent, order: &Order) -> Notification {
    let id = &order.id.0;
    let (title, body) = match event {
        SalesEvent::OrderCreated => (
            format!("Order {id} created"),
            format!(
                "Quotation {} was approved into an order for {} totalling {}.",
                order.quotation_id.0,
                order.customer_name,
                order.total()
            ),
        ),
        SalesEvent::PaymentReceived => (
            format!("Order {id} paid"),
            format!("Payment received for {}; the order is now processing.", order.customer_name),
        ),
        SalesEvent::OrderShipped => (
            format!("Order {id} shipped"),
            format!("The order for {} has left the warehouse.", order.customer_name),
        ),
        SalesEvent::OrderDelivered => (
            format!("Order {id} delivered"),
            format!("The order for {} has been delivered.", order.customer_name),
        ),
        SalesEvent::OrderCancelled => (
            format!("Order {id} cancelled"),
            format!("The order for {} was cancelled before payment.", order.customer_name),
        ),
        _ => (
            format!("Update on order {id}"),
            format!("The order for {} changed state.", order.customer_name),
        ),
    };

    Notification {
        recipient_id: recipient_id.to_owned(),
        kind: sales_kind(event),
        title,
        body,
        link: Some(format!("/api/v1/orders/{id}")),
    }
}

fn sales_kind(event: SalesEvent) -> NotificationKind {
    match event {
        SalesEvent::QuotationAwaitingApproval => NotificationKind::QuotationAwaitingApproval,
        SalesEvent::QuotationSent => NotificationKind::QuotationSent,
        SalesEvent::QuotationAccepted => NotificationKind::QuotationAccepted,
        SalesEvent::QuotationDeclined => NotificationKind::QuotationDeclined,
        SalesEvent::OrderCreated => NotificationKind::OrderCreated,
        SalesEvent::PaymentReceived => NotificationKind::PaymentReceived,
        SalesEvent::OrderShipped => NotificationKind::OrderShipped,
        SalesEvent::OrderDelivered => NotificationKind::OrderDelivered,
        SalesEvent::OrderCancelled => NotificationKind::OrderCancelled,
    }
}

fn waiting_stage(request: &Request) -> &'static str {
    request.current_stage.map(|role| role.display_name()).unwrap_or("nobody")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use reqflow_core::requests::{submit, NewRequest};
    use reqflow_core::sales::create_quotation;
    use reqflow_core::{
        ChainPolicy, NewQuotation, Order, OrderStatus, Principal, QuotationLine, RequestEvent,
        RequestType, Role, SalesEvent,
    };

    use super::{order_notification, quotation_notification, request_notification};
    use crate::NotificationKind;

    fn principal(user_id: &str, role: Role) -> Principal {
        Principal {
            user_id: user_id.to_owned(),
            name: user_id.to_owned(),
            email: format!("{user_id}@example.com"),
            role,
        }
    }

    fn submitted_request() -> reqflow_core::Request {
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

    #[test]
    fn submission_notice_names_the_creator_and_links_the_request() {
        let request = submitted_request();
        let notification =
            request_notification("staff-gm", RequestEvent::Submitted, &request);

        assert_eq!(notification.kind, NotificationKind::RequestSubmitted);
        assert_eq!(notification.recipient_id, "staff-gm");
        assert!(notification.title.contains(&request.id.0));
        assert!(notification.body.contains("staff-employee"));
        assert_eq!(
            notification.link.as_deref(),
            Some(format!("/api/v1/requests/{}", request.id.0).as_str())
        );
    }

    #[test]
    fn rejection_notice_goes_back_with_the_title() {
        let request = submitted_request();
        let notification =
            request_notification("staff-employee", RequestEvent::Rejected, &request);

        assert_eq!(notification.kind, NotificationKind::RequestRejected);
        assert!(notification.body.contains("Fuel float"));
    }

    #[test]
    fn accepted_quotation_notice_carries_customer_and_total() {
        let quotation = create_quotation(
            NewQuotation {
                customer_name: "Acme Distribution".to_owned(),
                lines: vec![QuotationLine {
                    description: "Receipt printer".to_owned(),
                    quantity: 2,
                    unit_price: Decimal::new(120_00, 2),
                }],
            },
            &principal("staff-agent", Role::SalesAgent),
            Utc::now(),
        )
        .expect("create");

        let notification =
            quotation_notification("staff-agent", SalesEvent::QuotationAccepted, &quotation);

        assert_eq!(notification.kind, NotificationKind::QuotationAccepted);
        assert!(notification.body.contains("Acme Distribution"));
        assert!(notification.body.contains("240.00"));
    }

    #[test]
    fn order_created_notice_links_back_to_the_order() {
        let order = Order {
            id: reqflow_core::OrderId("ORD-1".to_owned()),
            quotation_id: reqflow_core::QuotationId("QUO-1".to_owned()),
            customer_name: "Acme Distribution".to_owned(),
            agent_id: "staff-agent".to_owned(),
            lines: vec![QuotationLine {
                description: "Receipt printer".to_owned(),
                quantity: 2,
                unit_price: Decimal::new(120_00, 2),
            }],
            status: OrderStatus::AwaitingPayment,
            revision: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let notification = order_notification("staff-agent", SalesEvent::OrderCreated, &order);

        assert_eq!(notification.kind, NotificationKind::OrderCreated);
        assert!(notification.body.contains("QUO-1"));
        assert_eq!(notification.link.as_deref(), Some("/api/v1/orders/ORD-1"));
    }
}
