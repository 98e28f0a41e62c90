//! Subscription lifecycle integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn subscribe_and_fetch() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/subscriptions")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "plan": "pro", "interval": "yearly" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["plan"], "pro");
    assert_eq!(body["status"], "active");
    assert_eq!(body["interval"], "yearly");
    assert_eq!(body["used_this_month"], 0);

    let response = harness
        .server
        .get("/v1/subscriptions/me")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["plan"], "pro");
}

#[tokio::test]
async fn free_plan_is_not_subscribable() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/subscriptions")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "plan": "free" }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn duplicate_subscription_conflicts() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/subscriptions")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "plan": "pro" }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .post("/v1/subscriptions")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "plan": "ultra" }))
        .await;

    response.assert_status(axum::http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancel_keeps_current_period() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/subscriptions")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "plan": "pro" }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .delete("/v1/subscriptions")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "cancelled");
    assert!(body["cancelled_at"].is_string());

    // Still entitled until period end.
    let response = harness
        .server
        .post("/v1/entitlements/check")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({}))
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["decision"], "allowed");
}

#[tokio::test]
async fn cancel_without_subscription_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .delete("/v1/subscriptions")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn fetch_without_subscription_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/subscriptions/me")
        .add_header("authorization", harness.user_auth_header())
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn trial_is_one_time() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/subscriptions")
        .add_header("authorization", harness.user_auth_header())
        .json(&json!({ "plan": "trial", "interval": "monthly" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["interval"], "one_time");
}
