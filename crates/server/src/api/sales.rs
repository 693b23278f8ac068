//! Quotation and order endpoints. The transition handlers all share one
//! shape, so the load/run/persist/audit/notify sequence lives in two
//! helpers parameterized by the engine operation.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use reqflow_core::export::quotations_to_csv;
use reqflow_core::sales::{self, NewQuotation};
use reqflow_core::{
    ApplicationError, AuditCategory, AuditEvent, AuditOutcome, AuditSubject, Order, OrderId,
    OrderStatus, Principal, Quotation, QuotationId, QuotationStatus, SalesError, SalesFollowup,
};

use crate::documents::DocumentFormat;
use crate::state::AppState;

use super::{
    application_error, authenticate, dispatch_order_followups, dispatch_quotation_followups,
    domain_error, new_correlation_id, record_audit, ApiError,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/quotations", post(create_quotation).get(list_quotations))
        .route("/api/v1/quotations/export.csv", get(export_quotations))
        .route("/api/v1/quotations/{id}", get(get_quotation))
        .route("/api/v1/quotations/{id}/submit", post(submit_quotation))
        .route("/api/v1/quotations/{id}/send", post(send_quotation))
        .route("/api/v1/quotations/{id}/accept", post(accept_quotation))
        .route("/api/v1/quotations/{id}/decline", post(decline_quotation))
        .route("/api/v1/quotations/{id}/approve-sale", post(approve_sale))
        .route("/api/v1/quotations/{id}/document", get(quotation_document))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/{id}", get(get_order))
        .route("/api/v1/orders/{id}/receive-payment", post(receive_payment))
        .route("/api/v1/orders/{id}/ship", post(ship_order))
        .route("/api/v1/orders/{id}/deliver", post(deliver_order))
        .route("/api/v1/orders/{id}/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentParams {
    pub format: Option<String>,
}

async fn create_quotation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewQuotation>,
) -> Result<(StatusCode, Json<Quotation>), ApiError> {
    let correlation_id = new_correlation_id();
    let principal = authenticate(&state, &headers, &correlation_id).await?;

    let quotation = sales::create_quotation(body, &principal, Utc::now())
        .map_err(|error| domain_error(error, &correlation_id))?;

    state
        .quotations
        .insert(&quotation)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), &correlation_id))?;

    record_audit(
        &state,
        AuditEvent::new(
            Some(AuditSubject::quotation(&quotation.id.0)),
            &correlation_id,
            "sales.quotation_created",
            AuditCategory::Sales,
            &principal.user_id,
            AuditOutcome::Success,
        )
        .with_metadata("customer", quotation.customer_name.clone())
        .with_metadata("total", quotation.total().to_string()),
    )
    .await;

    Ok((StatusCode::CREATED, Json(quotation)))
}

async fn list_quotations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<StatusParams>,
) -> Result<Json<Vec<Quotation>>, ApiError> {
    let correlation_id = new_correlation_id();
    authenticate(&state, &headers, &correlation_id).await?;

    let status = match params.status.as_deref() {
        None => None,
        Some(value) => Some(QuotationStatus::parse(value).ok_or_else(|| {
            ApiError::unprocessable(format!("unknown status `{value}`"), &correlation_id)
        })?),
    };
    let quotations = state
        .quotations
        .list(status)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), &correlation_id))?;

    Ok(Json(quotations))
}

async fn get_quotation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Quotation>, ApiError> {
    let correlation_id = new_correlation_id();
    authenticate(&state, &headers, &correlation_id).await?;
    let quotation = load_quotation(&state, &id, &correlation_id).await?;
    Ok(Json(quotation))
}

async fn submit_quotation(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<Quotation>, ApiError> {
    quotation_transition(state, headers, id, "sales.quotation_submitted", sales::submit_for_approval)
        .await
}

async fn send_quotation(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<Quotation>, ApiError> {
    quotation_transition(state, headers, id, "sales.quotation_sent", sales::mark_sent).await
}

async fn accept_quotation(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<Quotation>, ApiError> {
    quotation_transition(state, headers, id, "sales.quotation_accepted", sales::record_acceptance)
        .await
}

async fn decline_quotation(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<Quotation>, ApiError> {
    quotation_transition(state, headers, id, "sales.quotation_declined", sales::record_decline)
        .await
}

async fn approve_sale(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let correlation_id = new_correlation_id();
    let principal = authenticate(&state, &headers, &correlation_id).await?;
    let quotation = load_quotation(&state, &id, &correlation_id).await?;

    let (order, followups) = match sales::approve_sale(&quotation, &principal, Utc::now()) {
        Ok(created) => created,
        Err(error) => {
            record_audit(
                &state,
                AuditEvent::new(
                    Some(AuditSubject::quotation(&id)),
                    &correlation_id,
                    "sales.sale_approved",
                    AuditCategory::Sales,
                    &principal.user_id,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error", error.to_string()),
            )
            .await;
            return Err(domain_error(error, &correlation_id));
        }
    };

    state
        .orders
        .insert(&order)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), &correlation_id))?;

    record_audit(
        &state,
        AuditEvent::new(
            Some(AuditSubject::order(&order.id.0)),
            &correlation_id,
            "sales.sale_approved",
            AuditCategory::Sales,
            &principal.user_id,
            AuditOutcome::Success,
        )
        .with_metadata("quotation_id", quotation.id.0.clone())
        .with_metadata("total", order.total().to_string()),
    )
    .await;
    dispatch_order_followups(&state, &order, followups).await;

    Ok((StatusCode::CREATED, Json(order)))
}

async fn quotation_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<DocumentParams>,
) -> Result<Response, ApiError> {
    let correlation_id = new_correlation_id();
    authenticate(&state, &headers, &correlation_id).await?;
    let quotation = load_quotation(&state, &id, &correlation_id).await?;

    let format = match params.format.as_deref() {
        None => DocumentFormat::default(),
        Some(value) => DocumentFormat::parse(value).ok_or_else(|| {
            ApiError::unprocessable(format!("unknown document format `{value}`"), &correlation_id)
        })?,
    };

    let rendered =
        state.documents.render_quotation(&quotation, format).await.map_err(|error| {
            application_error(ApplicationError::Integration(error.to_string()), &correlation_id)
        })?;

    Ok(rendered.into_response(&quotation.id.0))
}

async fn export_quotations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let correlation_id = new_correlation_id();
    authenticate(&state, &headers, &correlation_id).await?;

    let quotations = state
        .quotations
        .list(None)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), &correlation_id))?;
    let csv = quotations_to_csv(&quotations).map_err(|error| {
        application_error(ApplicationError::Integration(error.to_string()), &correlation_id)
    })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"quotations.csv\"".to_owned()),
        ],
        csv,
    )
        .into_response())
}

async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<StatusParams>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let correlation_id = new_correlation_id();
    authenticate(&state, &headers, &correlation_id).await?;

    let status = match params.status.as_deref() {
        None => None,
        Some(value) => Some(OrderStatus::parse(value).ok_or_else(|| {
            ApiError::unprocessable(format!("unknown status `{value}`"), &correlation_id)
        })?),
    };
    let orders = state
        .orders
        .list(status)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), &correlation_id))?;

    Ok(Json(orders))
}

async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let correlation_id = new_correlation_id();
    authenticate(&state, &headers, &correlation_id).await?;
    let order = load_order(&state, &id, &correlation_id).await?;
    Ok(Json(order))
}

async fn receive_payment(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<Order>, ApiError> {
    order_transition(state, headers, id, "sales.payment_received", sales::receive_payment).await
}

async fn ship_order(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<Order>, ApiError> {
    order_transition(state, headers, id, "sales.order_shipped", sales::mark_shipped).await
}

async fn deliver_order(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<Order>, ApiError> {
    order_transition(state, headers, id, "sales.order_delivered", sales::mark_delivered).await
}

async fn cancel_order(
    state: State<AppState>,
    headers: HeaderMap,
    id: Path<String>,
) -> Result<Json<Order>, ApiError> {
    order_transition(state, headers, id, "sales.order_cancelled", sales::cancel_order).await
}

async fn quotation_transition(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    event_type: &'static str,
    operation: impl FnOnce(
        &mut Quotation,
        &Principal,
        DateTime<Utc>,
    ) -> Result<Vec<SalesFollowup>, SalesError>,
) -> Result<Json<Quotation>, ApiError> {
    let correlation_id = new_correlation_id();
    let principal = authenticate(&state, &headers, &correlation_id).await?;
    let mut quotation = load_quotation(&state, &id, &correlation_id).await?;

    let followups = match operation(&mut quotation, &principal, Utc::now()) {
        Ok(followups) => followups,
        Err(error) => {
            record_audit(
                &state,
                AuditEvent::new(
                    Some(AuditSubject::quotation(&id)),
                    &correlation_id,
                    event_type,
                    AuditCategory::Sales,
                    &principal.user_id,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error", error.to_string()),
            )
            .await;
            return Err(domain_error(error, &correlation_id));
        }
    };

    let stored = state
        .quotations
        .update(&quotation)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), &correlation_id))?;

    record_audit(
        &state,
        AuditEvent::new(
            Some(AuditSubject::quotation(&stored.id.0)),
            &correlation_id,
            event_type,
            AuditCategory::Sales,
            &principal.user_id,
            AuditOutcome::Success,
        )
        .with_metadata("status", stored.status.as_str()),
    )
    .await;
    dispatch_quotation_followups(&state, &stored, followups).await;

    Ok(Json(stored))
}

async fn order_transition(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    event_type: &'static str,
    operation: impl FnOnce(
        &mut Order,
        &Principal,
        DateTime<Utc>,
    ) -> Result<Vec<SalesFollowup>, SalesError>,
) -> Result<Json<Order>, ApiError> {
    let correlation_id = new_correlation_id();
    let principal = authenticate(&state, &headers, &correlation_id).await?;
    let mut order = load_order(&state, &id, &correlation_id).await?;

    let followups = match operation(&mut order, &principal, Utc::now()) {
        Ok(followups) => followups,
        Err(error) => {
            record_audit(
                &state,
                AuditEvent::new(
                    Some(AuditSubject::order(&id)),
                    &correlation_id,
                    event_type,
                    AuditCategory::Sales,
                    &principal.user_id,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error", error.to_string()),
            )
            .await;
            return Err(domain_error(error, &correlation_id));
        }
    };

    let stored = state
        .orders
        .update(&order)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), &correlation_id))?;

    record_audit(
        &state,
        AuditEvent::new(
            Some(AuditSubject::order(&stored.id.0)),
            &correlation_id,
            event_type,
            AuditCategory::Sales,
            &principal.user_id,
            AuditOutcome::Success,
        )
        .with_metadata("status", stored.status.as_str()),
    )
    .await;
    dispatch_order_followups(&state, &stored, followups).await;

    Ok(Json(stored))
}

async fn load_quotation(
    state: &AppState,
    id: &str,
    correlation_id: &str,
) -> Result<Quotation, ApiError> {
    state
        .quotations
        .find_by_id(&QuotationId(id.to_owned()))
        .await
        .map_err(|error| application_error(ApplicationError::from(error), correlation_id))?
        .ok_or_else(|| {
            application_error(
                ApplicationError::NotFound(format!("quotation {id}")),
                correlation_id,
            )
        })
}

async fn load_order(state: &AppState, id: &str, correlation_id: &str) -> Result<Order, ApiError> {
    state
        .orders
        .find_by_id(&OrderId(id.to_owned()))
        .await
        .map_err(|error| application_error(ApplicationError::from(error), correlation_id))?
        .ok_or_else(|| {
            application_error(ApplicationError::NotFound(format!("order {id}")), correlation_id)
        })
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::Json;
    use rust_decimal::Decimal;

    use reqflow_core::sales::NewQuotation;
    use reqflow_core::{OrderStatus, QuotationLine, QuotationStatus, SignatureStatus};
    use reqflow_notify::NotificationKind;

    use super::{
        accept_quotation, approve_sale, create_quotation, deliver_order, receive_payment,
        send_quotation, ship_order, submit_quotation,
    };
    use crate::api::tests::{staff_headers, test_state};
    use crate::state::AppState;

    fn printer_quote() -> NewQuotation {
        NewQuotation {
            customer_name: "Acme Distribution".to_owned(),
            lines: vec![QuotationLine {
                description: "Receipt printer".to_owned(),
                quantity: 2,
                unit_price: Decimal::new(120_00, 2),
            }],
        }
    }

    async fn accepted_quotation(state: &AppState) -> String {
        let (_, Json(quotation)) = create_quotation(
            State(state.clone()),
            staff_headers("staff-agent"),
            Json(printer_quote()),
        )
        .await
        .expect("create");
        let id = quotation.id.0;

        submit_quotation(State(state.clone()), staff_headers("staff-agent"), Path(id.clone()))
            .await
            .expect("submit");
        send_quotation(State(state.clone()), staff_headers("staff-executive"), Path(id.clone()))
            .await
            .expect("send");
        let Json(accepted) =
            accept_quotation(State(state.clone()), staff_headers("staff-agent"), Path(id.clone()))
                .await
                .expect("accept");

        assert_eq!(accepted.status, QuotationStatus::Accepted);
        assert_eq!(accepted.signature_status, SignatureStatus::Signed);
        id
    }

    #[tokio::test]
    async fn an_accepted_quotation_becomes_an_order_and_is_fulfilled() {
        let (state, _sink) = test_state().await;
        let quotation_id = accepted_quotation(&state).await;

        let (status, Json(order)) = approve_sale(
            State(state.clone()),
            staff_headers("staff-md"),
            Path(quotation_id.clone()),
        )
        .await
        .expect("approve sale");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order.status, OrderStatus::AwaitingPayment);
        assert_eq!(order.quotation_id.0, quotation_id);
        assert_eq!(order.total(), Decimal::new(240_00, 2));

        let id = order.id.0;
        receive_payment(State(state.clone()), staff_headers("staff-cashier"), Path(id.clone()))
            .await
            .expect("payment");
        ship_order(State(state.clone()), staff_headers("staff-store"), Path(id.clone()))
            .await
            .expect("ship");
        let Json(delivered) =
            deliver_order(State(state.clone()), staff_headers("staff-store"), Path(id.clone()))
                .await
                .expect("deliver");

        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(delivered.revision, 3);
    }

    #[tokio::test]
    async fn only_the_originating_agent_records_acceptance() {
        let (state, _sink) = test_state().await;
        let (_, Json(quotation)) = create_quotation(
            State(state.clone()),
            staff_headers("staff-agent"),
            Json(printer_quote()),
        )
        .await
        .expect("create");
        let id = quotation.id.0;

        submit_quotation(State(state.clone()), staff_headers("staff-agent"), Path(id.clone()))
            .await
            .expect("submit");
        send_quotation(State(state.clone()), staff_headers("staff-executive"), Path(id.clone()))
            .await
            .expect("send");

        let error =
            accept_quotation(State(state.clone()), staff_headers("staff-executive"), Path(id))
                .await
                .expect_err("executive is not the originating agent");
        assert_eq!(error.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn a_draft_quotation_cannot_be_approved_into_an_order() {
        let (state, _sink) = test_state().await;
        let (_, Json(quotation)) = create_quotation(
            State(state.clone()),
            staff_headers("staff-agent"),
            Json(printer_quote()),
        )
        .await
        .expect("create");

        let error = approve_sale(
            State(state.clone()),
            staff_headers("staff-md"),
            Path(quotation.id.0),
        )
        .await
        .expect_err("draft cannot become an order");
        assert_eq!(error.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn order_creation_notifies_the_agent_and_the_cashier() {
        let (state, sink) = test_state().await;
        let quotation_id = accepted_quotation(&state).await;

        approve_sale(State(state.clone()), staff_headers("staff-gm"), Path(quotation_id))
            .await
            .expect("approve sale");

        let deliveries = sink.deliveries().await;
        let created: Vec<_> = deliveries
            .iter()
            .filter(|notification| notification.kind == NotificationKind::OrderCreated)
            .collect();
        assert!(created.iter().any(|n| n.recipient_id == "staff-agent"));
        assert!(created.iter().any(|n| n.recipient_id == "staff-cashier"));
    }
}
