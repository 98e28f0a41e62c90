//! Internal maintenance endpoint integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn monthly_reset_runs_once_per_month() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/internal/monthly-reset")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();

    // Second trigger in the same month is a guarded no-op.
    let response = harness
        .server
        .post("/internal/monthly-reset")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["touched"], 0);
}

#[tokio::test]
async fn bonus_sweep_is_idempotent() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/internal/bonus-sweep")
        .add_header("x-api-key", harness.service_api_key.clone())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["swept"], 0);
}

#[tokio::test]
async fn reconcile_backfills_an_order() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/internal/orders/reconcile")
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "order_id": "ord_backfill_1",
            "user_id": harness.test_user_id.to_string(),
            "credits_granted": 750,
            "status": "paid",
            "expires_at": null
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["reconciled"], true);

    let response = harness
        .server
        .get("/v1/credits/balance")
        .add_header("authorization", harness.user_auth_header())
        .await;
    let balance: serde_json::Value = response.json();
    assert_eq!(balance["left_credits"], 750);
}

#[tokio::test]
async fn internal_endpoints_require_service_key() {
    let harness = TestHarness::new();

    for path in [
        "/internal/monthly-reset",
        "/internal/bonus-sweep",
    ] {
        let response = harness
            .server
            .post(path)
            .add_header("authorization", harness.user_auth_header())
            .await;
        response.assert_status_unauthorized();
    }
}

#[tokio::test]
async fn wrong_service_key_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/internal/monthly-reset")
        .add_header("x-api-key", "wrong-key".to_string())
        .await;
    response.assert_status_unauthorized();
}
