//! End-to-end exercises of the HTTP surface against in-memory stores.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request as HttpRequest, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use reqflow_core::{ChainPolicy, Role, StaffMember};
use reqflow_db::repositories::{
    InMemoryAuditLogRepository, InMemoryOrderRepository, InMemoryQuotationRepository,
    InMemoryRequestRepository, InMemoryStaffRepository,
};
use reqflow_notify::InMemorySink;
use reqflow_server::api;
use reqflow_server::documents::DocumentRenderer;
use reqflow_server::state::AppState;

fn directory() -> Vec<StaffMember> {
    let roles = [
        ("staff-employee", Role::Employee, true),
        ("staff-agent", Role::SalesAgent, true),
        ("staff-executive", Role::SalesExecutive, true),
        ("staff-gm", Role::GeneralManager, true),
        ("staff-md", Role::ManagingDirector, true),
        ("staff-cashier", Role::Cashier, true),
        ("staff-store", Role::StoreManager, true),
        ("staff-retired", Role::Employee, false),
    ];
    roles
        .into_iter()
        .map(|(id, role, active)| StaffMember {
            id: id.to_owned(),
            name: id.to_owned(),
            email: format!("{id}@example.com"),
            role,
            active,
        })
        .collect()
}

async fn app() -> Router {
    let state = AppState {
        requests: Arc::new(InMemoryRequestRepository::default()),
        quotations: Arc::new(InMemoryQuotationRepository::default()),
        orders: Arc::new(InMemoryOrderRepository::default()),
        staff: Arc::new(InMemoryStaffRepository::with_members(directory()).await),
        audit: Arc::new(InMemoryAuditLogRepository::default()),
        policy: ChainPolicy::builtin(),
        notifier: Arc::new(InMemorySink::default()),
        documents: Arc::new(DocumentRenderer::new().expect("renderer")),
    };
    api::router(state)
}

fn request(method: &str, uri: &str, staff: Option<&str>, body: Option<Value>) -> HttpRequest<Body> {
    let mut builder = HttpRequest::builder().method(method).uri(uri);
    if let Some(staff_id) = staff {
        builder = builder.header("x-staff-id", staff_id);
    }
    match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn cash_request_body() -> Value {
    json!({
        "request_type": "cash",
        "title": "Fuel float",
        "reason": "Delivery van refuels",
        "amount": "150.00",
        "items": [],
        "needed_by": null,
        "delivery_location": null,
    })
}

#[tokio::test]
async fn a_cash_requisition_runs_submit_decide_issue_over_http() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(request("POST", "/api/v1/requests", Some("staff-employee"), Some(cash_request_body())))
        .await
        .expect("submit");
    assert_eq!(response.status(), StatusCode::CREATED);
    let submitted = json_body(response).await;
    let id = submitted["id"].as_str().expect("id").to_owned();
    assert_eq!(submitted["status"], "pending");

    for approver in ["staff-gm", "staff-md"] {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/v1/requests/{id}/decision"),
                Some(approver),
                Some(json!({ "approve": true })),
            ))
            .await
            .expect("decision");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(request("POST", &format!("/api/v1/requests/{id}/issue"), Some("staff-cashier"), None))
        .await
        .expect("issue");
    assert_eq!(response.status(), StatusCode::OK);
    let issued = json_body(response).await;
    assert_eq!(issued["status"], "issued");
}

#[tokio::test]
async fn requests_without_a_staff_header_are_unauthorized() {
    let app = app().await;

    let response = app
        .oneshot(request("POST", "/api/v1/requests", None, Some(cash_request_body())))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body["correlation_id"].as_str().is_some());
}

#[tokio::test]
async fn deactivated_staff_are_forbidden() {
    let app = app().await;

    let response = app
        .oneshot(request("POST", "/api/v1/requests", Some("staff-retired"), Some(cash_request_body())))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_records_are_not_found() {
    let app = app().await;

    let response = app
        .oneshot(request("GET", "/api/v1/requests/REQ-missing", Some("staff-employee"), None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_filter_values_are_unprocessable() {
    let app = app().await;

    let response = app
        .oneshot(request("GET", "/api/v1/requests?status=bogus", Some("staff-employee"), None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn a_blank_title_is_rejected_with_a_correlation_id() {
    let app = app().await;
    let mut body = cash_request_body();
    body["title"] = json!("   ");

    let response = app
        .oneshot(request("POST", "/api/v1/requests", Some("staff-employee"), Some(body)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = json_body(response).await;
    assert!(payload["error"].as_str().expect("error").contains("title"));
    assert!(payload["correlation_id"].as_str().is_some());
}

#[tokio::test]
async fn the_request_export_is_csv_with_a_header_row() {
    let app = app().await;

    app.clone()
        .oneshot(request("POST", "/api/v1/requests", Some("staff-employee"), Some(cash_request_body())))
        .await
        .expect("submit");

    let response = app
        .oneshot(request("GET", "/api/v1/requests/export.csv", Some("staff-gm"), None))
        .await
        .expect("export");

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .expect("content type")
        .to_owned();
    assert!(content_type.starts_with("text/csv"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");
    let mut lines = text.lines();
    assert!(lines.next().expect("header").starts_with("id,"));
    assert!(lines.next().expect("row").contains("Fuel float"));
}

#[tokio::test]
async fn the_sales_pipeline_runs_quotation_to_delivery_over_http() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/quotations",
            Some("staff-agent"),
            Some(json!({
                "customer_name": "Acme Distribution",
                "lines": [
                    { "description": "Receipt printer", "quantity": 2, "unit_price": "120.00" }
                ],
            })),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);
    let quotation = json_body(response).await;
    let quotation_id = quotation["id"].as_str().expect("id").to_owned();

    for (path, staff) in [
        ("submit", "staff-agent"),
        ("send", "staff-executive"),
        ("accept", "staff-agent"),
    ] {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/v1/quotations/{quotation_id}/{path}"),
                Some(staff),
                None,
            ))
            .await
            .expect(path);
        assert_eq!(response.status(), StatusCode::OK, "step {path}");
    }

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/quotations/{quotation_id}/approve-sale"),
            Some("staff-md"),
            None,
        ))
        .await
        .expect("approve sale");
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = json_body(response).await;
    let order_id = order["id"].as_str().expect("id").to_owned();
    assert_eq!(order["status"], "awaiting_payment");
    assert_eq!(order["quotation_id"], quotation_id.as_str());

    for (path, staff) in [
        ("receive-payment", "staff-cashier"),
        ("ship", "staff-store"),
        ("deliver", "staff-store"),
    ] {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/v1/orders/{order_id}/{path}"),
                Some(staff),
                None,
            ))
            .await
            .expect(path);
        assert_eq!(response.status(), StatusCode::OK, "step {path}");
    }

    let response = app
        .oneshot(request("GET", &format!("/api/v1/orders/{order_id}"), Some("staff-agent"), None))
        .await
        .expect("get order");
    let fetched = json_body(response).await;
    assert_eq!(fetched["status"], "delivered");
}

#[tokio::test]
async fn quotation_documents_render_as_html_on_request() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/quotations",
            Some("staff-agent"),
            Some(json!({
                "customer_name": "Acme Distribution",
                "lines": [
                    { "description": "Receipt printer", "quantity": 2, "unit_price": "120.00" }
                ],
            })),
        ))
        .await
        .expect("create");
    let quotation = json_body(response).await;
    let quotation_id = quotation["id"].as_str().expect("id").to_owned();

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/quotations/{quotation_id}/document?format=html"),
            Some("staff-agent"),
            None,
        ))
        .await
        .expect("document");

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .expect("content type")
        .to_owned();
    assert!(content_type.starts_with("text/html"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let html = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(html.contains("Acme Distribution"));
    assert!(html.contains("240.00"));
}
