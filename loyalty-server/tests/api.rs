//! End-to-end API tests against a real on-disk SQLite database

use axum::body::Body;
use axum::Router;
use http::{header, Request, StatusCode};
use loyalty_server::{routes, Config, ServerState};
use serde_json::{json, Value};
use tower::ServiceExt;

const MERCHANT: &str = "42";
const PHONE: &str = "966500000001";

async fn test_app() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let port = 10_000 + (rand::random::<u16>() % 20_000);
    let config = Config::with_overrides(dir.path().to_str().unwrap(), port);
    let state = ServerState::initialize(&config).await.unwrap();
    (routes::build_app().with_state(state), dir)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-merchant-id", MERCHANT)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-merchant-id", MERCHANT)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("x-merchant-id", MERCHANT)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_merchant_header_required() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/loyalty/settings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], 3002);
}

#[tokio::test]
async fn test_settings_seeded_and_updatable() {
    let (app, _dir) = test_app().await;

    let response = app.clone().oneshot(get("/api/loyalty/settings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let settings = json_body(response).await;
    assert_eq!(settings["is_enabled"], true);
    assert_eq!(settings["points_expiry_days"], 365);

    // Default tier ladder seeded alongside
    let response = app.clone().oneshot(get("/api/loyalty/tiers")).await.unwrap();
    let tiers = json_body(response).await;
    assert_eq!(tiers.as_array().unwrap().len(), 3);
    assert_eq!(tiers[0]["name"], "Bronze");

    let response = app
        .oneshot(put(
            "/api/loyalty/settings",
            json!({"enable_birthday_bonus": true, "points_expiry_days": 30}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert_eq!(updated["enable_birthday_bonus"], true);
    assert_eq!(updated["points_expiry_days"], 30);
    // Untouched fields survive
    assert_eq!(updated["referral_bonus_points"], 50);
}

#[tokio::test]
async fn test_purchase_accrual_and_idempotent_retry() {
    let (app, _dir) = test_app().await;

    let payload = json!({
        "customer_phone": PHONE,
        "kind": "purchase",
        "order_total": "250.5",
        "source_ref": "order-1001",
    });

    let response = app
        .clone()
        .oneshot(post("/api/loyalty/accrue", payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "posted");
    assert_eq!(body["entry"]["amount"], 250);

    // Webhook retry: same outcome, no second credit
    let response = app
        .clone()
        .oneshot(post("/api/loyalty/accrue", payload))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "already_recorded");
    assert_eq!(body["entry"]["amount"], 250);

    let response = app
        .oneshot(get(&format!("/api/loyalty/customers/{PHONE}")))
        .await
        .unwrap();
    let balance = json_body(response).await;
    assert_eq!(balance["current_points"], 250);
    assert_eq!(balance["lifetime_points"], 250);
    assert_eq!(balance["tier"]["name"], "Bronze");
}

#[tokio::test]
async fn test_redeem_and_overdraw() {
    let (app, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(post(
            &format!("/api/loyalty/customers/{PHONE}/credit"),
            json!({"points": 500, "reason": "Welcome gift"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 100 points at the default 10 points/unit = 10.00
    let response = app
        .clone()
        .oneshot(post(
            &format!("/api/loyalty/customers/{PHONE}/redeem"),
            json!({"points": 100}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let receipt = json_body(response).await;
    assert_eq!(receipt["currency_value"], "10.00");
    assert_eq!(receipt["remaining_points"], 400);

    // Overdraw is rejected with the structured balance error
    let response = app
        .clone()
        .oneshot(post(
            &format!("/api/loyalty/customers/{PHONE}/deduct"),
            json!({"points": 1000}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["code"], 4002);
    assert_eq!(body["details"]["available"], 400);
    assert_eq!(body["details"]["requested"], 1000);
}

#[tokio::test]
async fn test_adjustment_stores_caller_reason_and_actor() {
    let (app, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(post(
            &format!("/api/loyalty/customers/{PHONE}/credit"),
            json!({"points": 100}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post(
            &format!("/api/loyalty/customers/{PHONE}/deduct"),
            json!({
                "points": 40,
                "reason": "Fraud reversal",
                "reason_ar": "عكس احتيال",
                "actor": "admin@shop",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let entry = json_body(response).await;
    assert_eq!(entry["reason"], "Fraud reversal [admin@shop]");
    assert_eq!(entry["reason_ar"], "عكس احتيال [admin@shop]");
}

#[tokio::test]
async fn test_transactions_and_stats() {
    let (app, _dir) = test_app().await;

    for (total, source) in [("100", "o1"), ("50", "o2")] {
        let response = app
            .clone()
            .oneshot(post(
                "/api/loyalty/accrue",
                json!({
                    "customer_phone": PHONE,
                    "kind": "purchase",
                    "order_total": total,
                    "source_ref": source,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // Distinct created_at so "newest first" is deterministic
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    let response = app
        .clone()
        .oneshot(post(
            &format!("/api/loyalty/customers/{PHONE}/redeem"),
            json!({"points": 30}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/loyalty/customers/{PHONE}/transactions?limit=2"
        )))
        .await
        .unwrap();
    let transactions = json_body(response).await;
    let list = transactions.as_array().unwrap();
    assert_eq!(list.len(), 2);
    // Newest first: the redemption leads
    assert_eq!(list[0]["kind"], "redemption");

    let response = app.clone().oneshot(get("/api/loyalty/stats")).await.unwrap();
    let stats = json_body(response).await;
    assert_eq!(stats["total_customers"], 1);
    assert_eq!(stats["total_points_distributed"], 150);
    assert_eq!(stats["total_points_redeemed"], 30);
    assert_eq!(stats["total_redemptions"], 1);

    let response = app.oneshot(get("/api/loyalty/customers")).await.unwrap();
    let customers = json_body(response).await;
    assert_eq!(customers.as_array().unwrap().len(), 1);
    assert_eq!(customers[0]["current_points"], 120);
}

#[tokio::test]
async fn test_disabled_program_skips_accrual() {
    let (app, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(put("/api/loyalty/settings", json!({"is_enabled": false})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post(
            "/api/loyalty/accrue",
            json!({
                "customer_phone": PHONE,
                "kind": "purchase",
                "order_total": "100",
                "source_ref": "order-1",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "skipped");
    assert_eq!(body["skip_reason"], "program_disabled");

    // But redemption is refused loudly
    let response = app
        .oneshot(post(
            &format!("/api/loyalty/customers/{PHONE}/redeem"),
            json!({"points": 10}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["code"], 4004);
}

#[tokio::test]
async fn test_unknown_customer_404() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(get("/api/loyalty/customers/966599999999"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], 4006);
}
