//! REST surface. Every handler follows the same shape: authenticate the
//! acting staff member, load the subject, run the pure engine operation,
//! persist on success, then audit and dispatch notifications. Audit and
//! notification failures after a committed write are logged, never
//! surfaced; the write is already durable.

pub mod requests;
pub mod sales;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use reqflow_core::{
    ApplicationError, AuditEvent, DomainError, InterfaceError, Order, Principal, Quotation,
    Request,
};
use reqflow_notify::messages;

use crate::state::AppState;

/// Header carrying the acting staff id. Upstream authentication is assumed
/// to have verified the identity; this service enforces role permissions.
pub const STAFF_ID_HEADER: &str = "x-staff-id";

pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .merge(requests::routes())
        .merge(sales::routes())
        .with_state(state)
}

/// Uniform error payload: an HTTP status plus a correlation id the caller
/// can quote when reporting the problem.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub correlation_id: String,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>, correlation_id: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
            correlation_id: correlation_id.to_owned(),
        }
    }

    pub fn unprocessable(message: impl Into<String>, correlation_id: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
            correlation_id: correlation_id.to_owned(),
        }
    }

    pub fn from_interface(error: InterfaceError) -> Self {
        let status = match &error {
            InterfaceError::BadRequest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let correlation_id = error.correlation_id().to_owned();
        Self { status, message: error.to_string(), correlation_id }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.message,
            "correlation_id": self.correlation_id,
        });
        (self.status, Json(body)).into_response()
    }
}

pub(crate) fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn application_error(error: ApplicationError, correlation_id: &str) -> ApiError {
    ApiError::from_interface(error.into_interface(correlation_id))
}

pub(crate) fn domain_error(error: impl Into<DomainError>, correlation_id: &str) -> ApiError {
    application_error(ApplicationError::Domain(error.into()), correlation_id)
}

/// Resolves the acting principal from the staff directory. The stored role
/// is authoritative; callers cannot claim one.
pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    correlation_id: &str,
) -> Result<Principal, ApiError> {
    let staff_id = headers
        .get(STAFF_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::unauthorized("missing X-Staff-Id header", correlation_id))?;

    let member = state
        .staff
        .find_by_id(staff_id)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), correlation_id))?
        .ok_or_else(|| {
            ApiError::unauthorized(format!("unknown staff id `{staff_id}`"), correlation_id)
        })?;

    if !member.active {
        return Err(ApiError {
            status: StatusCode::FORBIDDEN,
            message: format!("staff member `{staff_id}` is deactivated"),
            correlation_id: correlation_id.to_owned(),
        });
    }

    Ok(member.principal())
}

/// Appends an audit event; a failed append is logged and swallowed.
pub(crate) async fn record_audit(state: &AppState, event: AuditEvent) {
    if let Err(error) = state.audit.append(&event).await {
        warn!(
            event_name = "audit.append_failed",
            %error,
            audit_event = %event.event_type,
            "audit trail write failed after a committed operation"
        );
    }
}

// Followup dispatch. Role intents fan out to every active member of the
// role; delivery failures are logged and dropped.

pub(crate) async fn dispatch_request_followups(
    state: &AppState,
    request: &Request,
    followups: Vec<reqflow_core::Followup>,
) {
    for followup in followups {
        match followup {
            reqflow_core::Followup::NotifyUser { user_id, event } => {
                deliver(state, messages::request_notification(&user_id, event, request)).await;
            }
            reqflow_core::Followup::NotifyRole { role, event } => {
                for member in members_of(state, role).await {
                    deliver(state, messages::request_notification(&member, event, request)).await;
                }
            }
        }
    }
}

pub(crate) async fn dispatch_quotation_followups(
    state: &AppState,
    quotation: &Quotation,
    followups: Vec<reqflow_core::SalesFollowup>,
) {
    for followup in followups {
        match followup {
            reqflow_core::SalesFollowup::NotifyUser { user_id, event } => {
                deliver(state, messages::quotation_notification(&user_id, event, quotation))
                    .await;
            }
            reqflow_core::SalesFollowup::NotifyRole { role, event } => {
                for member in members_of(state, role).await {
                    deliver(state, messages::quotation_notification(&member, event, quotation))
                        .await;
                }
            }
        }
    }
}

pub(crate) async fn dispatch_order_followups(
    state: &AppState,
    order: &Order,
    followups: Vec<reqflow_core::SalesFollowup>,
) {
    for followup in followups {
        match followup {
            reqflow_core::SalesFollowup::NotifyUser { user_id, event } => {
                deliver(state, messages::order_notification(&user_id, event, order)).await;
            }
            reqflow_core::SalesFollowup::NotifyRole { role, event } => {
                for member in members_of(state, role).await {
                    deliver(state, messages::order_notification(&member, event, order)).await;
                }
            }
        }
    }
}

async fn members_of(state: &AppState, role: reqflow_core::Role) -> Vec<String> {
    match state.staff.list_active_by_role(role).await {
        Ok(members) => members.into_iter().map(|member| member.id).collect(),
        Err(error) => {
            warn!(
                event_name = "notify.recipient_lookup_failed",
                role = role.as_str(),
                %error,
                "could not resolve role recipients"
            );
            Vec::new()
        }
    }
}

async fn deliver(state: &AppState, notification: reqflow_notify::Notification) {
    if let Err(error) = state.notifier.deliver(&notification).await {
        warn!(
            event_name = "notify.delivery_failed",
            kind = notification.kind.as_str(),
            recipient = %notification.recipient_id,
            %error,
            "notification dropped"
        );
    }
}
