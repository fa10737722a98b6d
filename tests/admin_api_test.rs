mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{FakePayout, FakeSwap, Harness, SESSION_SECRET};
use remit_core::config::Secret;
use remit_core::create_app;
use remit_core::domain::{KycRecord, KycStatus, TransactionStatus};
use remit_core::health::ProviderChecker;
use remit_core::middleware::auth::issue_session_token;
use remit_core::ports::TransactionRepository;
use remit_core::providers::{ConversionStatus, ProviderError};

fn bearer(user_id: Uuid) -> String {
    let token = issue_session_token(&Secret::new(SESSION_SECRET), user_id).unwrap();
    format!("Bearer {}", token)
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// POST with a raw body and an optional content type.
fn post_raw(uri: &str, auth: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, auth);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_missing_session_is_unauthorized() {
    let h = Harness::new();
    let tx = h.seed_deposit(Uuid::new_v4(), 100, "USDT");

    let (status, body) = call(
        create_app(h.app_state()),
        post(
            &format!("/admin/transactions/{}/update", tx.id),
            None,
            json!({"action": "mark_received"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_forged_session_is_unauthorized() {
    let h = Harness::new();
    let admin = h.seed_admin();
    let forged = issue_session_token(&Secret::new("other-secret"), admin).unwrap();

    let (status, _) = call(
        create_app(h.app_state()),
        get("/admin/transactions/list", Some(&format!("Bearer {}", forged))),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let h = Harness::new();
    let tx = h.seed_deposit(Uuid::new_v4(), 100, "USDT");
    let auth = bearer(Uuid::new_v4());

    let (status, _) = call(
        create_app(h.app_state()),
        post(
            &format!("/admin/transactions/{}/update", tx.id),
            Some(&auth),
            json!({"action": "mark_received"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    let stored = h.repos.transactions.get_by_id(tx.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::PendingDeposit);
}

#[tokio::test]
async fn test_mark_received_over_http() {
    let h = Harness::new();
    let auth = bearer(h.seed_admin());
    let tx = h.seed_deposit(Uuid::new_v4(), 1000, "USDT");
    let app = create_app(h.app_state());

    let (status, body) = call(
        app.clone(),
        post(
            &format!("/admin/transactions/{}/update", tx.id),
            Some(&auth),
            json!({"action": "mark_received"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["newStatus"], "deposit_received");
    assert!(body.get("trackingNumber").is_none());

    let (status, body) = call(
        app.clone(),
        post(
            &format!("/admin/transactions/{}/update", tx.id),
            Some(&auth),
            json!({"action": "mark_received"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, body) = call(
        app,
        get(&format!("/admin/transactions/{}/ledger", tx.id), Some(&auth)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_action_is_bad_request() {
    let h = Harness::new();
    let auth = bearer(h.seed_admin());
    let tx = h.seed_deposit(Uuid::new_v4(), 10, "USDT");
    let app = create_app(h.app_state());

    for body in [json!({"action": "refund"}), json!({})] {
        let (status, _) = call(
            app.clone(),
            post(&format!("/admin/transactions/{}/update", tx.id), Some(&auth), body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_action_for_wrong_type_is_bad_request() {
    let h = Harness::new();
    let auth = bearer(h.seed_admin());
    let tx = h.seed_deposit(Uuid::new_v4(), 10, "USDT");

    let (status, _) = call(
        create_app(h.app_state()),
        post(
            &format!("/admin/transactions/{}/update", tx.id),
            Some(&auth),
            json!({"action": "send_payout"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_transaction_is_not_found() {
    let h = Harness::new();
    let auth = bearer(h.seed_admin());

    let (status, _) = call(
        create_app(h.app_state()),
        post(
            &format!("/admin/transactions/{}/update", Uuid::new_v4()),
            Some(&auth),
            json!({"action": "mark_received"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway() {
    let h = Harness::with(
        FakePayout::failing(ProviderError::new("fake-payout", "http_500", "upstream exploded")),
        FakeSwap::ok(),
        Duration::from_secs(5),
    );
    let auth = bearer(h.seed_admin());
    let (_tx, payout) = h.seed_payout(100);

    let (status, body) = call(
        create_app(h.app_state()),
        post(&format!("/admin/payouts/{}/send", payout.id), Some(&auth), json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body["error"].as_str().unwrap().contains("upstream exploded"));
}

#[tokio::test]
async fn test_send_payout_over_http() {
    let h = Harness::new();
    let auth = bearer(h.seed_admin());
    let (_tx, payout) = h.seed_payout(100);
    let app = create_app(h.app_state());

    let (status, body) = call(
        app.clone(),
        post(&format!("/admin/payouts/{}/send", payout.id), Some(&auth), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["transactionStatus"], "payout_sent");
    assert!(body["trackingNumber"].as_str().unwrap().starts_with("TRK-"));

    let (status, body) = call(app, get("/admin/payouts/list", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payouts"][0]["status"], "sent");
}

#[tokio::test]
async fn test_kyc_update_status_over_http() {
    let h = Harness::new();
    let auth = bearer(h.seed_admin());
    let record = KycRecord::new(Uuid::new_v4());
    h.store.insert_kyc(record.clone()).unwrap();
    let app = create_app(h.app_state());

    let (status, body) = call(
        app.clone(),
        post(
            &format!("/admin/kyc/{}/update-status", record.id),
            Some(&auth),
            json!({"status": "rejected", "notes": ["Blurry passport"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "status": "rejected"}));

    let (status, _) = call(
        app.clone(),
        post(
            &format!("/admin/kyc/{}/update-status", record.id),
            Some(&auth),
            json!({"status": "archived"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(app, get("/admin/kyc/list", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kycRecords"][0]["notes"][0], "Blurry passport");
    assert_eq!(body["kycRecords"][0]["status"], KycStatus::Rejected.as_str());
}

#[tokio::test]
async fn test_dashboard_stats_over_http() {
    let h = Harness::new();
    let auth = bearer(h.seed_admin());
    h.store.insert_client(Uuid::new_v4()).unwrap();
    h.store.insert_kyc(KycRecord::new(Uuid::new_v4())).unwrap();
    h.seed_deposit(Uuid::new_v4(), 10, "USDT");

    let (status, body) = call(
        create_app(h.app_state()),
        get("/admin/dashboard/stats", Some(&auth)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["totalClients"], 1);
    assert_eq!(body["stats"]["pendingKYC"], 1);
    assert_eq!(body["stats"]["pendingTransactions"], 1);
    assert_eq!(body["recentKYC"].as_array().unwrap().len(), 1);
    assert_eq!(body["recentTransactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_wallet_provisioning_over_http() {
    let h = Harness::new();
    let auth = bearer(h.seed_admin());
    let mut record = KycRecord::new(Uuid::new_v4());
    record.status = KycStatus::Approved;
    h.store.insert_kyc(record.clone()).unwrap();
    let app = create_app(h.app_state());
    let uri = format!("/admin/clients/{}/wallet", record.user_id);

    let (status, body) = call(app.clone(), post(&uri, Some(&auth), json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"], true);
    assert_eq!(body["wallet"]["addresses"].as_array().unwrap().len(), 3);

    let (status, body) = call(app, post(&uri, Some(&auth), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);
}

#[tokio::test]
async fn test_health_without_dependencies() {
    let h = Harness::new();

    let (status, body) = call(create_app(h.app_state()), get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let h = Harness::new();

    let (status, body) = call(create_app(h.app_state()), get("/api-docs/openapi.json", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/admin/transactions/{id}/update"].is_object());
}

#[tokio::test]
async fn test_malformed_bodies_are_bad_request() {
    let h = Harness::new();
    let auth = bearer(h.seed_admin());
    let tx = h.seed_deposit(Uuid::new_v4(), 100, "USDT");
    let record = KycRecord::new(Uuid::new_v4());
    h.store.insert_kyc(record.clone()).unwrap();
    let app = create_app(h.app_state());
    let update_uri = format!("/admin/transactions/{}/update", tx.id);

    let cases = [
        post_raw(&update_uri, &auth, Some("application/json"), r#"{"action": 5}"#),
        post_raw(&update_uri, &auth, Some("application/json"), "not json"),
        post_raw(
            &format!("/admin/kyc/{}/update-status", record.id),
            &auth,
            None,
            r#"{"status": "approved"}"#,
        ),
    ];
    for request in cases {
        let (status, body) = call(app.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().unwrap().contains("request body"));
    }

    let stored = h.repos.transactions.get_by_id(tx.id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::PendingDeposit);
}

#[tokio::test]
async fn test_verify_without_body_uses_default_types() {
    let h = Harness::new();
    let auth = bearer(h.seed_admin());
    let record = KycRecord::new(Uuid::new_v4());
    h.store.insert_kyc(record.clone()).unwrap();
    let app = create_app(h.app_state());
    let uri = format!("/admin/kyc/{}/verify", record.id);

    let wrong_type = post_raw(&uri, &auth, Some("application/json"), r#"{"types": 3}"#);
    let (status, body) = call(app.clone(), wrong_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, body) = call(app, post_raw(&uri, &auth, None, "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kycRecord"]["status"], KycStatus::UnderReview.as_str());
}

#[tokio::test]
async fn test_refresh_swap_over_http() {
    let h = Harness::with(FakePayout::ok(), FakeSwap::pending_conversions(), Duration::from_secs(5));
    let auth = bearer(h.seed_admin());
    let tx = h.seed_swap(Uuid::new_v4(), 100, "USDT", "MXN");
    let app = create_app(h.app_state());
    let refresh_uri = format!("/admin/transactions/{}/refresh-swap", tx.id);

    let (status, body) = call(
        app.clone(),
        post(
            &format!("/admin/transactions/{}/update", tx.id),
            Some(&auth),
            json!({"action": "execute_swap"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["newStatus"], "swap_processing");

    let (status, body) = call(app.clone(), post(&refresh_uri, Some(&auth), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["newStatus"], "swap_processing");
    assert_eq!(body["changed"], false);

    h.swap.settle(ConversionStatus::Completed);
    let (status, body) = call(app.clone(), post(&refresh_uri, Some(&auth), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["newStatus"], "swap_completed");
    assert_eq!(body["changed"], true);

    let (status, body) = call(
        app,
        get(&format!("/admin/transactions/{}/ledger", tx.id), Some(&auth)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_integration_connectivity_over_http() {
    let h = Harness::with(FakePayout::ok(), FakeSwap::unreachable(), Duration::from_secs(5));
    let auth = bearer(h.seed_admin());
    let app = create_app(h.app_state());

    let (status, body) = call(app.clone(), get("/admin/integrations/payout/test", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], true);
    assert_eq!(body["provider"], "fake-payout");

    let (status, body) = call(app.clone(), get("/admin/integrations/swap/test", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], false);
    assert_eq!(body["integration"], "swap");
    assert_eq!(body["result"]["error"], "http_401");

    let (status, _) = call(app.clone(), get("/admin/integrations/ledger/test", Some(&auth))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(app, get("/admin/integrations/payout/test", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_reports_unreachable_provider() {
    let h = Harness::with(FakePayout::ok(), FakeSwap::unreachable(), Duration::from_secs(5));
    let state = h
        .app_state()
        .with_health_checks(ProviderChecker::all(&h.providers));

    let (status, body) = call(create_app(state), get("/health", None)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["dependencies"]["fake-payout"]["status"], "healthy");
    assert_eq!(body["dependencies"]["fake-swap"]["error"], "http_401");
}
