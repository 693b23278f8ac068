//! Requisition endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use reqflow_core::export::requests_to_csv;
use reqflow_core::requests::{self, Decision, IssueOutcome, NewRequest};
use reqflow_core::{
    ApplicationError, AuditCategory, AuditEvent, AuditOutcome, AuditSubject, Request, RequestId,
    RequestStatus, RequestType,
};
use reqflow_db::repositories::RequestFilter;

use crate::documents::DocumentFormat;
use crate::state::AppState;

use super::{
    application_error, authenticate, dispatch_request_followups, domain_error,
    new_correlation_id, record_audit, ApiError,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/requests", post(submit_request).get(list_requests))
        .route("/api/v1/requests/export.csv", get(export_requests))
        .route("/api/v1/requests/{id}", get(get_request))
        .route("/api/v1/requests/{id}/decision", post(decide_request))
        .route("/api/v1/requests/{id}/issue", post(issue_request))
        .route("/api/v1/requests/{id}/cancel", post(cancel_request))
        .route("/api/v1/requests/{id}/document", get(request_document))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub request_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
pub struct DocumentParams {
    pub format: Option<String>,
}

async fn submit_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewRequest>,
) -> Result<(StatusCode, Json<Request>), ApiError> {
    let correlation_id = new_correlation_id();
    let principal = authenticate(&state, &headers, &correlation_id).await?;

    let (request, followups) = requests::submit(body, &principal, &state.policy, Utc::now())
        .map_err(|error| domain_error(error, &correlation_id))?;

    state
        .requests
        .insert(&request)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), &correlation_id))?;

    record_audit(
        &state,
        AuditEvent::new(
            Some(AuditSubject::request(&request.id.0)),
            &correlation_id,
            "requests.submitted",
            AuditCategory::Requests,
            &principal.user_id,
            AuditOutcome::Success,
        )
        .with_metadata("type", request.request_type.as_str())
        .with_metadata("amount", request.amount.to_string()),
    )
    .await;
    dispatch_request_followups(&state, &request, followups).await;

    Ok((StatusCode::CREATED, Json(request)))
}

async fn list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Request>>, ApiError> {
    let correlation_id = new_correlation_id();
    authenticate(&state, &headers, &correlation_id).await?;

    let filter = parse_filter(&params, &correlation_id)?;
    let requests = state
        .requests
        .list(filter)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), &correlation_id))?;

    Ok(Json(requests))
}

async fn get_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Request>, ApiError> {
    let correlation_id = new_correlation_id();
    authenticate(&state, &headers, &correlation_id).await?;
    let request = load_request(&state, &id, &correlation_id).await?;
    Ok(Json(request))
}

async fn decide_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<Request>, ApiError> {
    let correlation_id = new_correlation_id();
    let principal = authenticate(&state, &headers, &correlation_id).await?;
    let mut request = load_request(&state, &id, &correlation_id).await?;

    let decision = if body.approve { Decision::Approve } else { Decision::Reject };
    let outcome = match requests::decide(&mut request, &principal, decision, Utc::now()) {
        Ok(outcome) => outcome,
        Err(error) => {
            record_audit(
                &state,
                AuditEvent::new(
                    Some(AuditSubject::request(&id)),
                    &correlation_id,
                    "requests.decision_recorded",
                    AuditCategory::Requests,
                    &principal.user_id,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error", error.to_string()),
            )
            .await;
            return Err(domain_error(error, &correlation_id));
        }
    };

    let stored = update_request(&state, &request, &correlation_id).await?;
    record_audit(
        &state,
        AuditEvent::new(
            Some(AuditSubject::request(&stored.id.0)),
            &correlation_id,
            "requests.decision_recorded",
            AuditCategory::Requests,
            &principal.user_id,
            AuditOutcome::Success,
        )
        .with_metadata("decision", if body.approve { "approve" } else { "reject" })
        .with_metadata("status", stored.status.as_str()),
    )
    .await;
    dispatch_request_followups(&state, &stored, outcome.followups).await;

    Ok(Json(stored))
}

async fn issue_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Request>, ApiError> {
    let correlation_id = new_correlation_id();
    let principal = authenticate(&state, &headers, &correlation_id).await?;
    let mut request = load_request(&state, &id, &correlation_id).await?;

    let outcome = match requests::issue(&mut request, &principal, Utc::now()) {
        Ok(outcome) => outcome,
        Err(error) => {
            record_audit(
                &state,
                AuditEvent::new(
                    Some(AuditSubject::request(&id)),
                    &correlation_id,
                    "requests.issued",
                    AuditCategory::Requests,
                    &principal.user_id,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error", error.to_string()),
            )
            .await;
            return Err(domain_error(error, &correlation_id));
        }
    };

    // A repeat issue call is a no-op, not an error.
    let followups = match outcome {
        IssueOutcome::AlreadyFinal => return Ok(Json(request)),
        IssueOutcome::Finalized { followups } => followups,
    };

    let stored = update_request(&state, &request, &correlation_id).await?;
    record_audit(
        &state,
        AuditEvent::new(
            Some(AuditSubject::request(&stored.id.0)),
            &correlation_id,
            "requests.issued",
            AuditCategory::Requests,
            &principal.user_id,
            AuditOutcome::Success,
        )
        .with_metadata("status", stored.status.as_str()),
    )
    .await;
    dispatch_request_followups(&state, &stored, followups).await;

    Ok(Json(stored))
}

async fn cancel_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Request>, ApiError> {
    let correlation_id = new_correlation_id();
    let principal = authenticate(&state, &headers, &correlation_id).await?;
    let mut request = load_request(&state, &id, &correlation_id).await?;

    let followups = match requests::cancel(&mut request, &principal, Utc::now()) {
        Ok(followups) => followups,
        Err(error) => {
            record_audit(
                &state,
                AuditEvent::new(
                    Some(AuditSubject::request(&id)),
                    &correlation_id,
                    "requests.cancelled",
                    AuditCategory::Requests,
                    &principal.user_id,
                    AuditOutcome::Rejected,
                )
                .with_metadata("error", error.to_string()),
            )
            .await;
            return Err(domain_error(error, &correlation_id));
        }
    };

    let stored = update_request(&state, &request, &correlation_id).await?;
    record_audit(
        &state,
        AuditEvent::new(
            Some(AuditSubject::request(&stored.id.0)),
            &correlation_id,
            "requests.cancelled",
            AuditCategory::Requests,
            &principal.user_id,
            AuditOutcome::Success,
        ),
    )
    .await;
    dispatch_request_followups(&state, &stored, followups).await;

    Ok(Json(stored))
}

async fn export_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let correlation_id = new_correlation_id();
    authenticate(&state, &headers, &correlation_id).await?;

    let requests = state
        .requests
        .list(RequestFilter::default())
        .await
        .map_err(|error| application_error(ApplicationError::from(error), &correlation_id))?;
    let csv = requests_to_csv(&requests).map_err(|error| {
        application_error(ApplicationError::Integration(error.to_string()), &correlation_id)
    })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"requests.csv\"".to_owned()),
        ],
        csv,
    )
        .into_response())
}

async fn request_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<DocumentParams>,
) -> Result<Response, ApiError> {
    let correlation_id = new_correlation_id();
    authenticate(&state, &headers, &correlation_id).await?;
    let request = load_request(&state, &id, &correlation_id).await?;

    let format = match params.format.as_deref() {
        None => DocumentFormat::default(),
        Some(value) => DocumentFormat::parse(value).ok_or_else(|| {
            ApiError::unprocessable(format!("unknown document format `{value}`"), &correlation_id)
        })?,
    };

    let rendered = state.documents.render_request(&request, format).await.map_err(|error| {
        application_error(ApplicationError::Integration(error.to_string()), &correlation_id)
    })?;

    Ok(rendered.into_response(&request.id.0))
}

fn parse_filter(params: &ListParams, correlation_id: &str) -> Result<RequestFilter, ApiError> {
    let status = match params.status.as_deref() {
        None => None,
        Some(value) => Some(RequestStatus::parse(value).ok_or_else(|| {
            ApiError::unprocessable(format!("unknown status `{value}`"), correlation_id)
        })?),
    };
    let request_type = match params.request_type.as_deref() {
        None => None,
        Some(value) => Some(RequestType::parse(value).ok_or_else(|| {
            ApiError::unprocessable(format!("unknown request type `{value}`"), correlation_id)
        })?),
    };
    Ok(RequestFilter { status, request_type })
}

async fn load_request(
    state: &AppState,
    id: &str,
    correlation_id: &str,
) -> Result<Request, ApiError> {
    state
        .requests
        .find_by_id(&RequestId(id.to_owned()))
        .await
        .map_err(|error| application_error(ApplicationError::from(error), correlation_id))?
        .ok_or_else(|| {
            application_error(ApplicationError::NotFound(format!("request {id}")), correlation_id)
        })
}

async fn update_request(
    state: &AppState,
    request: &Request,
    correlation_id: &str,
) -> Result<Request, ApiError> {
    state
        .requests
        .update(request)
        .await
        .map_err(|error| application_error(ApplicationError::from(error), correlation_id))
}
