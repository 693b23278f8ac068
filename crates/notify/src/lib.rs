//! Notification hub for the requisition and sales workflows.
//!
//! The workflow engines in `reqflow-core` report notification intents
//! (notify this role or user about that event); this crate renders an
//! intent plus its subject entity into a [`Notification`] and hands it to
//! a [`NotificationSink`]. Delivery is fire-and-forget: callers log a
//! failed delivery and carry on, so a broken webhook never blocks an
//! approval that has already been written.

pub mod messages;
pub mod sink;

pub use sink::{InMemorySink, NoopSink, NotificationSink, WebhookSink};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier configuration invalid: {0}")]
    Configuration(String),
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Closed set of notification kinds. The webhook payload carries the
/// snake_case code, so receivers can route on it without parsing titles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RequestSubmitted,
    RequestStageAdvanced,
    RequestApproved,
    RequestRejected,
    RequestIssued,
    RequestDelivered,
    RequestCancelled,
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

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestSubmitted => "request_submitted",
            Self::RequestStageAdvanced => "request_stage_advanced",
            Self::RequestApproved => "request_approved",
            Self::RequestRejected => "request_rejected",
            Self::RequestIssued => "request_issued",
            Self::RequestDelivered => "request_delivered",
            Self::RequestCancelled => "request_cancelled",
            Self::QuotationAwaitingApproval => "quotation_awaiting_approval",
            Self::QuotationSent => "quotation_sent",
            Self::QuotationAccepted => "quotation_accepted",
            Self::QuotationDeclined => "quotation_declined",
            Self::OrderCreated => "order_created",
            Self::PaymentReceived => "payment_received",
            Self::OrderShipped => "order_shipped",
            Self::OrderDelivered => "order_delivered",
            Self::OrderCancelled => "order_cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "request_submitted" => Some(Self::RequestSubmitted),
            "request_stage_advanced" => Some(Self::RequestStageAdvanced),
            "request_approved" => Some(Self::RequestApproved),
            "request_rejected" => Some(Self::RequestRejected),
            "request_issued" => Some(Self::RequestIssued),
            "request_delivered" => Some(Self::RequestDelivered),
            "request_cancelled" => Some(Self::RequestCancelled),
            "quotation_awaiting_approval" => Some(Self::QuotationAwaitingApproval),
            "quotation_sent" => Some(Self::QuotationSent),
            "quotation_accepted" => Some(Self::QuotationAccepted),
            "quotation_declined" => Some(Self::QuotationDeclined),
            "order_created" => Some(Self::OrderCreated),
            "payment_received" => Some(Self::PaymentReceived),
            "order_shipped" => Some(Self::OrderShipped),
            "order_delivered" => Some(Self::OrderDelivered),
            "order_cancelled" => Some(Self::OrderCancelled),
            _ => None,
        }
    }
}

/// A rendered, addressed message ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Staff id of the person this goes to. Role intents are expanded to
    /// one notification per active member before reaching a sink.
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Relative link to the subject resource, when there is one.
    pub link: Option<String>,
}
