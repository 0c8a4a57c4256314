mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{MONTHLY, SUBSCRIPTION_ID, bill_body, get, post, post_json, service};
use kakasaku::billing::{BillingStore, PaymentStatus};
use kakasaku::testing::fixtures;

#[tokio::test]
async fn test_create_bill_returns_payment_link() {
    let svc = service().await;

    let response = post_json(&svc.app, "/kakasaku/bills", bill_body(&["1-2026", "2-2026"])).await;

    assert_eq!(response.status, StatusCode::CREATED);
    let data = &response.body["data"];
    let bill_no = data["bill_no"].as_str().unwrap();
    assert_eq!(data["amount"], 2 * MONTHLY);
    assert_eq!(data["periods"], serde_json::json!(["1-2026", "2-2026"]));
    assert_eq!(data["redirect_url"], format!("https://pay.mock/{}", bill_no));
    assert_eq!(response.location.as_deref(), Some(format!("/kakasaku/payments/{}", bill_no).as_str()));

    let record = svc.store.get_payment(bill_no).await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    assert_eq!(record.covered(), fixtures::periods(&["1-2026", "2-2026"]));
}

#[tokio::test]
async fn test_create_bill_rejects_gap() {
    let svc = service().await;

    let response = post_json(&svc.app, "/kakasaku/bills", bill_body(&["1-2026", "3-2026"])).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
    assert_eq!(svc.store.payment_count().await, 0);
}

#[tokio::test]
async fn test_create_bill_rejects_empty_selection() {
    let svc = service().await;

    let response = post_json(&svc.app, "/kakasaku/bills", bill_body(&[])).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_bill_unknown_subscription() {
    let svc = service().await;
    let mut body = bill_body(&["1-2026"]);
    body["subscription_id"] = "sub_missing".into();

    let response = post_json(&svc.app, "/kakasaku/bills", body).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_gateway_refusal_stores_nothing() {
    let svc = service().await;
    svc.gateway.fail_requests(true);

    let response = post_json(&svc.app, "/kakasaku/bills", bill_body(&["1-2026"])).await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(svc.store.payment_count().await, 0);
}

#[tokio::test]
async fn test_redirect_settles_bill_once() {
    let svc = service().await;
    let created = post_json(&svc.app, "/kakasaku/bills", bill_body(&["1-2026", "2-2026"])).await;
    let bill_no = created.body["data"]["bill_no"].as_str().unwrap().to_string();
    svc.gateway.set_status(&bill_no, "2");

    let uri = format!(
        "/kakasaku/status?trx_id=TRX000001&bill_no={}&status=2&bill_total={}",
        bill_no,
        2 * MONTHLY
    );
    let first = get(&svc.app, &uri).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["data"]["status"], "success");
    assert_eq!(first.body["data"]["reconcile"]["outcome"], "transitioned");

    let second = get(&svc.app, &uri).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["data"]["reconcile"]["outcome"], "already_final");
    assert_eq!(svc.gateway.inquiry_count(), 1);

    let paid = svc.store.paid_periods(SUBSCRIPTION_ID).await.unwrap();
    assert_eq!(paid.into_iter().collect::<Vec<_>>(), fixtures::periods(&["1-2026", "2-2026"]));
}

#[tokio::test]
async fn test_redirect_without_bill_number() {
    let svc = service().await;

    let response = get(&svc.app, "/kakasaku/status?trx_id=TRX000001&status=2").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_pending_and_failed() {
    let svc = service().await;
    let created = post_json(&svc.app, "/kakasaku/bills", bill_body(&["1-2026"])).await;
    let bill_no = created.body["data"]["bill_no"].as_str().unwrap().to_string();
    let uri = format!("/kakasaku/payments/{}/refresh", bill_no);

    let pending = post(&svc.app, &uri).await;
    assert_eq!(pending.status, StatusCode::OK);
    assert_eq!(pending.body["data"]["status"], "pending");
    assert_eq!(pending.body["data"]["reconcile"]["outcome"], "unchanged");

    svc.gateway.set_status(&bill_no, "7");
    let failed = post(&svc.app, &uri).await;
    assert_eq!(failed.body["data"]["status"], "failed");

    // A failed bill leaves the month payable
    let retry = post_json(&svc.app, "/kakasaku/bills", bill_body(&["1-2026"])).await;
    assert_eq!(retry.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_refresh_unknown_bill() {
    let svc = service().await;

    let response = post(&svc.app, "/kakasaku/payments/KKSK-NOPE/refresh").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refresh_gateway_down() {
    let svc = service().await;
    let created = post_json(&svc.app, "/kakasaku/bills", bill_body(&["1-2026"])).await;
    let bill_no = created.body["data"]["bill_no"].as_str().unwrap().to_string();
    svc.gateway.fail_inquiries(true);

    let response = post(&svc.app, &format!("/kakasaku/payments/{}/refresh", bill_no)).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    let record = svc.store.get_payment(&bill_no).await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_get_payment() {
    let svc = service().await;
    let created = post_json(&svc.app, "/kakasaku/bills", bill_body(&["1-2026"])).await;
    let location = created.location.unwrap();

    let response = get(&svc.app, &location).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "pending");
    assert_eq!(response.body["data"]["total_amount"], MONTHLY);
}

#[tokio::test]
async fn test_calendar_for_new_subscription() {
    let svc = service().await;

    let response = get(&svc.app, "/kakasaku/subscriptions/sub_1/calendar").await;

    assert_eq!(response.status, StatusCode::OK);
    let data = &response.body["data"];
    assert_eq!(data["year"], 2026);
    assert_eq!(data["next_due"], "1-2026");
    let slots = data["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 12);
    assert_eq!(slots[0]["id"], "1-2026");
    assert_eq!(slots[0]["disabled"], false);
    assert_eq!(slots[1]["disabled"], true);
    assert_eq!(data["total"], 0);
    assert_eq!(data["all_selected"], false);
}

#[tokio::test]
async fn test_calendar_with_selection() {
    let svc = service().await;

    let response = get(
        &svc.app,
        "/kakasaku/subscriptions/sub_1/calendar?selected=1-2026,2-2026",
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let data = &response.body["data"];
    assert_eq!(data["total"], 2 * MONTHLY);
    let slots = data["slots"].as_array().unwrap();
    assert_eq!(slots[2]["disabled"], false);
    assert_eq!(slots[3]["disabled"], true);
}

#[tokio::test]
async fn test_calendar_previous_year_is_locked() {
    let svc = service().await;

    let response = get(&svc.app, "/kakasaku/subscriptions/sub_1/calendar?year=2025").await;

    let slots = response.body["data"]["slots"].as_array().unwrap();
    assert!(slots.iter().all(|s| s["before_start"] == true && s["disabled"] == true));
}

#[tokio::test]
async fn test_calendar_rejects_gapped_selection() {
    let svc = service().await;

    let gap = get(&svc.app, "/kakasaku/subscriptions/sub_1/calendar?selected=2-2026").await;
    assert_eq!(gap.status, StatusCode::BAD_REQUEST);

    let garbage = get(&svc.app, "/kakasaku/subscriptions/sub_1/calendar?selected=13-2026").await;
    assert_eq!(garbage.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_calendar_after_payment() {
    let svc = service().await;
    let created = post_json(&svc.app, "/kakasaku/bills", bill_body(&["1-2026", "2-2026"])).await;
    let bill_no = created.body["data"]["bill_no"].as_str().unwrap().to_string();
    svc.gateway.set_status(&bill_no, "2");
    post(&svc.app, &format!("/kakasaku/payments/{}/refresh", bill_no)).await;

    let response = get(&svc.app, "/kakasaku/subscriptions/sub_1/calendar").await;

    let data = &response.body["data"];
    assert_eq!(data["next_due"], "3-2026");
    let slots = data["slots"].as_array().unwrap();
    assert_eq!(slots[0]["paid"], true);
    assert_eq!(slots[0]["disabled"], true);
    assert_eq!(slots[2]["disabled"], false);
}

#[tokio::test]
async fn test_calendar_unknown_subscription() {
    let svc = service().await;

    let response = get(&svc.app, "/kakasaku/subscriptions/sub_missing/calendar").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_donor_summary() {
    let svc = service().await;
    let first = post_json(&svc.app, "/kakasaku/bills", bill_body(&["1-2026", "2-2026"])).await;
    let bill_no = first.body["data"]["bill_no"].as_str().unwrap().to_string();
    svc.gateway.set_status(&bill_no, "2");
    post(&svc.app, &format!("/kakasaku/payments/{}/refresh", bill_no)).await;
    post_json(&svc.app, "/kakasaku/bills", bill_body(&["3-2026"])).await;

    let response = get(&svc.app, "/kakasaku/donors/donor_1/summary").await;

    assert_eq!(response.status, StatusCode::OK);
    let data = &response.body["data"];
    assert_eq!(data["total_transactions"], 2);
    assert_eq!(data["total_donated"], 2 * MONTHLY);
    assert_eq!(data["next_due"], "3-2026");
    assert_eq!(data["subscription"]["id"], SUBSCRIPTION_ID);
}

#[tokio::test]
async fn test_donor_summary_without_subscription() {
    let svc = service().await;

    let response = get(&svc.app, "/kakasaku/donors/donor_nobody/summary").await;

    assert_eq!(response.status, StatusCode::OK);
    let data = &response.body["data"];
    assert_eq!(data["total_transactions"], 0);
    assert!(data["subscription"].is_null());
    assert!(data["next_due"].is_null());
}

#[tokio::test]
async fn test_calendar_rejects_out_of_range_year() {
    let svc = service().await;

    let response = get(&svc.app, "/kakasaku/subscriptions/sub_1/calendar?year=-2147483648").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = get(&svc.app, "/kakasaku/subscriptions/sub_1/calendar?year=10000").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_packages_cheapest_first() {
    let svc = service().await;

    let response = get(&svc.app, "/kakasaku/packages").await;

    assert_eq!(response.status, StatusCode::OK);
    let amounts: Vec<i64> = response.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["monthly_amount"].as_i64().unwrap())
        .collect();
    assert_eq!(amounts, vec![25_000, 50_000, 100_000]);
}

#[tokio::test]
async fn test_subscribe_new_donor() {
    let svc = service().await;

    let response = post_json(
        &svc.app,
        "/kakasaku/subscriptions",
        serde_json::json!({
            "donor_id": "donor_2",
            "package_id": "pkg_25000",
            "start_date": "2026-03-15"
        }),
    )
    .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let data = &response.body["data"];
    assert_eq!(data["donor_id"], "donor_2");
    assert_eq!(data["monthly_amount"], 25_000);
    let id = data["id"].as_str().unwrap();
    assert_eq!(
        response.location.as_deref(),
        Some(format!("/kakasaku/subscriptions/{}/calendar", id).as_str())
    );

    let calendar = get(&svc.app, &format!("/kakasaku/subscriptions/{}/calendar", id)).await;
    assert_eq!(calendar.status, StatusCode::OK);
    assert_eq!(calendar.body["data"]["next_due"], "3-2026");
}

#[tokio::test]
async fn test_subscribe_twice_conflicts() {
    let svc = service().await;
    let body = serde_json::json!({ "donor_id": "donor_2", "package_id": "pkg_50000" });

    let first = post_json(&svc.app, "/kakasaku/subscriptions", body.clone()).await;
    let second = post_json(&svc.app, "/kakasaku/subscriptions", body).await;

    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(second.status, StatusCode::CONFLICT);

    let existing = post_json(
        &svc.app,
        "/kakasaku/subscriptions",
        serde_json::json!({ "donor_id": "donor_1", "package_id": "pkg_50000" }),
    )
    .await;
    assert_eq!(existing.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_subscribe_unknown_package() {
    let svc = service().await;

    let response = post_json(
        &svc.app,
        "/kakasaku/subscriptions",
        serde_json::json!({ "donor_id": "donor_2", "package_id": "pkg_gold" }),
    )
    .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(svc.store.find_active_subscription("donor_2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_payment_history_newest_first() {
    let svc = service().await;
    let months = ["1-2026", "2-2026", "3-2026", "4-2026", "5-2026", "6-2026"];
    let base = Utc::now() - Duration::days(30);
    for (i, month) in months.iter().enumerate() {
        let mut record =
            fixtures::pending_record(&format!("KKSK-{}", i + 1), SUBSCRIPTION_ID, &[month], MONTHLY);
        record.created_at = base + Duration::days(i as i64);
        svc.store.insert_payment(&record).await.unwrap();
    }

    let response = get(&svc.app, "/kakasaku/donors/donor_1/payments").await;

    assert_eq!(response.status, StatusCode::OK);
    let bill_nos: Vec<&str> = response.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["bill_no"].as_str().unwrap())
        .collect();
    assert_eq!(bill_nos, vec!["KKSK-6", "KKSK-5", "KKSK-4", "KKSK-3", "KKSK-2", "KKSK-1"]);

    let empty = get(&svc.app, "/kakasaku/donors/donor_nobody/payments").await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["data"].as_array().unwrap().len(), 0);
}
