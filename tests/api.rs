//! Integration tests driving the full axum router via `tower::ServiceExt::oneshot`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use pow_faucet::handlers::{build_router, AppState};
use pow_faucet::storage::{SqliteStorage, Storage};
use pow_faucet::{BlockEngine, FaucetConfig};

fn build_app(difficulty_bits: u32, max_shares_pb: u64) -> Router {
    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let mut config = FaucetConfig::default();
    config.difficulty_bits = difficulty_bits;
    config.block_time_ms = 60_000; // long enough that no tick fires mid-test
    config.max_shares_pb = max_shares_pb;
    let engine = BlockEngine::boot(Arc::clone(&storage), config.clone()).unwrap();
    build_router(Arc::new(AppState::new(engine, storage, config)))
}

fn get(uri: &str) -> Request<Body> {
    with_peer(Request::builder().uri(uri).body(Body::empty()).unwrap())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    with_peer(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
}

fn with_peer(mut req: Request<Body>) -> Request<Body> {
    let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

const ADDR: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

#[tokio::test]
async fn challenge_returns_current_block_snapshot() {
    let app = build_app(0, 500);
    let resp = app.oneshot(get("/challenge")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["blockNumber"], 1);
    assert_eq!(body["difficultyBits"], 0);
}

#[tokio::test]
async fn submit_proof_accepts_any_nonce_at_zero_difficulty() {
    let app = build_app(0, 500);
    let req = post_json(
        "/submit-proof",
        json!({"address": ADDR, "nonce": "n1"}),
    );
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["accepted"], true);
    assert_eq!(body["blockNumber"], 1);
}

#[tokio::test]
async fn duplicate_share_is_rejected_with_409() {
    let app = build_app(0, 500);
    let first = post_json("/submit-proof", json!({"address": ADDR, "nonce": "same"}));
    assert_eq!(
        app.clone().oneshot(first).await.unwrap().status(),
        StatusCode::OK
    );

    let second = post_json("/submit-proof", json!({"address": ADDR, "nonce": "same"}));
    assert_eq!(
        app.oneshot(second).await.unwrap().status(),
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn per_block_quota_returns_429() {
    let app = build_app(0, 1);
    let first = post_json("/submit-proof", json!({"address": ADDR, "nonce": "a"}));
    assert_eq!(
        app.clone().oneshot(first).await.unwrap().status(),
        StatusCode::OK
    );

    let second = post_json("/submit-proof", json!({"address": ADDR, "nonce": "b"}));
    assert_eq!(
        app.oneshot(second).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn missing_fields_returns_400() {
    let app = build_app(0, 500);
    let req = post_json("/submit-proof", json!({"address": ADDR}));
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "Missing required fields");
}

#[tokio::test]
async fn invalid_address_format_returns_400() {
    let app = build_app(0, 500);
    let req = post_json(
        "/submit-proof",
        json!({"address": "not-an-address", "nonce": "n1"}),
    );
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "Invalid Ethereum address format");
}

#[tokio::test]
async fn insufficient_proof_of_work_returns_400() {
    // 64 leading zero bits is unreachable in practice for an arbitrary nonce.
    let app = build_app(64, 500);
    let req = post_json("/submit-proof", json!({"address": ADDR, "nonce": "n1"}));
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "Insufficient proof-of-work");
}

#[tokio::test]
async fn withdraw_with_no_balance_returns_400() {
    let app = build_app(0, 500);
    let req = post_json(
        "/withdraw-request",
        json!({"address": ADDR, "amountMicro": 2_000_000_000u64}),
    );
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "Insufficient balance");
}

#[tokio::test]
async fn withdraw_amount_below_fee_returns_400() {
    let app = build_app(0, 500);
    let req = post_json(
        "/withdraw-request",
        json!({"address": ADDR, "amountMicro": 10u64}),
    );
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_requires_valid_address() {
    let app = build_app(0, 500);
    let resp = app
        .oneshot(get("/status?address=not-an-address"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_reports_zero_balance_for_fresh_address() {
    let app = build_app(0, 500);
    let resp = app.oneshot(get(&format!("/status?address={ADDR}"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["balanceMicro"], 0);
}

#[tokio::test]
async fn health_reports_open_block_processor() {
    let app = build_app(0, 500);
    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["blockProcessor"]["state"], "open");
}

#[tokio::test]
async fn payouts_list_starts_empty() {
    let app = build_app(0, 500);
    let resp = app.oneshot(get("/payouts")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["payouts"].as_array().unwrap().len(), 0);
}
