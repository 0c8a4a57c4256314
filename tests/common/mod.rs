//! Shared helpers for driving the Kakasaku router in integration tests.
#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use kakasaku::billing::{BillingStore, InMemoryBillingStore};
use kakasaku::config::BillingConfig;
use kakasaku::http::{AppState, router};
use kakasaku::testing::{MockGateway, fixtures};
use serde_json::Value;
use tower::ServiceExt;

pub const SUBSCRIPTION_ID: &str = "sub_1";
pub const DONOR_ID: &str = "donor_1";
pub const MONTHLY: i64 = 50_000;
/// Seeded out of price order.
pub const PACKAGE_AMOUNTS: [i64; 3] = [100_000, 25_000, 50_000];

pub struct TestService {
    pub store: InMemoryBillingStore,
    pub gateway: MockGateway,
    pub app: Router,
}

/// A router over an in-memory store holding one active subscription that
/// started in January 2026, and the packages in [`PACKAGE_AMOUNTS`].
pub async fn service() -> TestService {
    let store = InMemoryBillingStore::new();
    store
        .save_subscription(&fixtures::subscription(SUBSCRIPTION_ID, DONOR_ID, MONTHLY, "1-2026"))
        .await
        .unwrap();
    for amount in PACKAGE_AMOUNTS {
        store.save_package(&fixtures::package(amount)).await.unwrap();
    }

    let gateway = MockGateway::new();
    let state = AppState::new(store.clone(), gateway.clone(), &BillingConfig::default());

    TestService {
        store,
        gateway,
        app: router(state),
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Value,
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse { status, location, body }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post(app: &Router, uri: &str) -> TestResponse {
    send(app, Request::post(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> TestResponse {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Checkout body for `sub_1` and the given months.
pub fn bill_body(months: &[&str]) -> Value {
    serde_json::json!({
        "subscription_id": SUBSCRIPTION_ID,
        "periods": months,
        "customer": {
            "id": DONOR_ID,
            "name": "Donor One",
            "email": "donor1@example.com"
        }
    })
}
