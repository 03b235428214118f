//! Integration tests for the lucky subscription service.
//!
//! These tests wire the crates together the way the API server does:
//! a real store, the Razorpay client pointed at a local mock of the Orders
//! API, and the drand client pointed at a local mock serving a real
//! quicknet round. The HTTP suite drives the full router over a loopback
//! listener with `reqwest`.
//!
//! Run:
//! ```bash
//! cargo test -p lucky-integration-tests
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, TimeZone, Utc};
use lucky_api_server::state::{AppState, AuthConfig};
use lucky_api_server::{build_router, cors_layer};
use lucky_common::{
    compute_leaf_hash, verify_merkle_proof, Caller, ClaimStatus, DrawStatus, Env, WeekId,
};
use lucky_drand_beacon::{
    BeaconError, ChainInfo, DrandBeacon, OsRandomness, Randomness, RandomnessSource,
};
use lucky_reward_distributor::execute::{submit_claim, update_claim_status};
use lucky_reward_distributor::msg::{SubmitClaimRequest, UpdateClaimStatusRequest};
use lucky_reward_distributor::query::{draw_history, verify_inclusion};
use lucky_reward_distributor::selection::select_winners;
use lucky_reward_distributor::state::DRAW_SETTINGS;
use lucky_reward_distributor::{
    DistributorError, DrawExecutor, DrawSettings, MemoryNotifier, RunTrigger,
};
use lucky_store::{sync_all, DocumentStore, SqlStore, Store};
use lucky_subscription_hub::execute::{
    create_subscription_order, register_user, verify_subscription_payment,
};
use lucky_subscription_hub::msg::{RegisterUserRequest, VerifyPaymentRequest};
use lucky_subscription_hub::payments::payment_signature;
use lucky_subscription_hub::{HubConfig, HubError, RazorpayClient};
use serde_json::{json, Value};

// ─── Constants ───

/// Real quicknet test vector: round 1000
const TEST_ROUND: u64 = 1000;
const TEST_SIG_HEX: &str = "b44679b9a59af2ec876b1a6b1ad52ea9b1615fc3982b19576350f93447cb1125e342b73a8dd2bacbe47e4b6b63ed5e39";
const TEST_RANDOMNESS_HEX: &str =
    "fe290beca10872ef2fb164d2aa4442de4566183ec51c56ff3cd603d930e54fdd";

const KEY_ID: &str = "rzp_test_key";
const KEY_SECRET: &str = "rzp_test_secret";
const ADMIN_EMAIL: &str = "ops@example.com";

/// Nothing listens on the discard port.
const DEAD_URL: &str = "http://127.0.0.1:9";

// ─── Mock servers ───

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// drand HTTP API that only knows round 1000.
async fn mock_drand() -> String {
    let app = Router::new().route(
        "/:chain/public/:round",
        get(|Path((_chain, round)): Path<(String, u64)>| async move {
            if round != TEST_ROUND {
                return (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown round" })));
            }
            (
                StatusCode::OK,
                Json(json!({ "round": round, "signature": TEST_SIG_HEX })),
            )
        }),
    );
    serve(app).await
}

/// Razorpay Orders API; the order id echoes the receipt.
async fn mock_razorpay() -> String {
    let app = Router::new().route(
        "/v1/orders",
        post(|Json(body): Json<Value>| async move {
            let receipt = body["receipt"].as_str().unwrap_or_default().to_string();
            Json(json!({
                "id": format!("order_{receipt}"),
                "amount": body["amount"],
                "currency": body["currency"],
                "receipt": receipt,
                "status": "created",
            }))
        }),
    );
    serve(app).await
}

// ─── Helpers ───

/// The instant quicknet published round 1000.
fn round_time() -> DateTime<Utc> {
    Utc.timestamp_opt(ChainInfo::quicknet().round_time(TEST_ROUND), 0)
        .unwrap()
}

struct FixedSource([u8; 32]);

#[async_trait]
impl RandomnessSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch(&self, _at: DateTime<Utc>) -> Result<Randomness, BeaconError> {
        Ok(Randomness {
            bytes: self.0,
            round: None,
            source: "fixed".to_string(),
        })
    }
}

fn register(store: &dyn Store, env: &Env, uid: &str, referral_code: Option<String>) {
    register_user(
        store,
        env,
        &Caller::user(uid),
        RegisterUserRequest {
            email: format!("{uid}@example.com"),
            display_name: Some(uid.to_uppercase()),
            referral_code,
        },
    )
    .unwrap();
}

/// Order, pay and activate a subscription for `uid`.
async fn subscribe(store: &dyn Store, gateway: &RazorpayClient, env: &Env, uid: &str) {
    let config = HubConfig::default();
    let caller = Caller::user(uid);
    let order = create_subscription_order(store, gateway, &config, env, &caller)
        .await
        .unwrap();
    assert_eq!(order.amount, config.amount_minor());
    assert_eq!(order.key_id, KEY_ID);

    let payment_id = format!("pay_{uid}");
    verify_subscription_payment(
        store,
        gateway,
        &config,
        env,
        &caller,
        VerifyPaymentRequest {
            razorpay_signature: payment_signature(KEY_SECRET, &order.order_id, &payment_id)
                .unwrap(),
            razorpay_order_id: order.order_id,
            razorpay_payment_id: payment_id,
        },
    )
    .unwrap();
}

fn save_settings(store: &dyn Store, settings: DrawSettings) {
    DRAW_SETTINGS.save(store, &settings, Utc::now()).unwrap();
}

// ─── Draw pipeline ───

#[tokio::test]
async fn test_full_draw_with_drand_beacon() {
    let store = Arc::new(SqlStore::open_in_memory().unwrap());
    let gateway = RazorpayClient::new(mock_razorpay().await, KEY_ID, KEY_SECRET).unwrap();
    let notifier = Arc::new(MemoryNotifier::new());
    let beacon = DrandBeacon::new(mock_drand().await, ChainInfo::quicknet()).unwrap();
    let executor = DrawExecutor::new(
        store.clone(),
        Arc::new(beacon),
        Arc::new(OsRandomness),
        notifier.clone(),
    )
    .with_backoff_ms(0);

    let signup = Env::at(round_time() - Duration::days(1));
    register(store.as_ref(), &signup, "amy", None);
    let amy_code = store.get_user("amy").unwrap().unwrap().referral_code;
    register(store.as_ref(), &signup, "bob", Some(amy_code));
    register(store.as_ref(), &signup, "cat", None);
    assert_eq!(
        store.get_user("bob").unwrap().unwrap().referred_by.as_deref(),
        Some("amy")
    );
    for uid in ["amy", "bob", "cat"] {
        subscribe(store.as_ref(), &gateway, &signup, uid).await;
    }

    let env = Env::at(round_time());
    let week = WeekId::from_datetime(env.now);
    let draw = executor.run(&env, week, RunTrigger::Admin).await.unwrap();

    assert_eq!(draw.status, DrawStatus::Completed);
    assert_eq!(draw.randomness.as_deref(), Some(TEST_RANDOMNESS_HEX));
    assert_eq!(draw.randomness_source.as_deref(), Some("drand_quicknet"));
    assert_eq!(draw.entrants, vec!["amy", "bob", "cat"]);
    assert_eq!(draw.total_revenue, 147);
    // 50% of 147 is below the 500 floor
    assert_eq!(draw.total_prize_pool, 500);

    // Anyone can replay the selection from the published randomness
    let randomness: [u8; 32] = hex::decode(TEST_RANDOMNESS_HEX)
        .unwrap()
        .try_into()
        .unwrap();
    let expected = select_winners(&draw.entrants, &randomness, 1);
    assert_eq!(draw.winners.len(), 1);
    assert_eq!(draw.winners[0].uid, expected[0]);
    assert_eq!(notifier.count("winner_announced"), 1);

    // Every entrant can prove inclusion against the committed root
    let root = draw.entrants_root.clone().unwrap();
    for uid in ["amy", "bob", "cat"] {
        let inclusion = verify_inclusion(store.as_ref(), week, uid).unwrap();
        assert!(inclusion.included, "{uid}");
        let leaf = compute_leaf_hash(uid, inclusion.index.unwrap());
        assert!(verify_merkle_proof(&root, &inclusion.proof, &leaf));
    }
    assert!(!verify_inclusion(store.as_ref(), week, "dan").unwrap().included);

    // The same week never runs twice
    let err = executor.run(&env, week, RunTrigger::Admin).await.unwrap_err();
    assert!(matches!(err, DistributorError::DrawAlreadyCompleted { .. }));

    // Claim lifecycle
    let winner = draw.winners[0].uid.clone();
    let loser = ["amy", "bob", "cat"]
        .into_iter()
        .find(|uid| *uid != winner)
        .unwrap();
    let request = SubmitClaimRequest {
        week,
        payout_details: "upi: winner@bank".to_string(),
    };

    let err = submit_claim(store.as_ref(), &env, &Caller::user(loser), request.clone()).unwrap_err();
    assert!(matches!(err, DistributorError::NotAWinner { .. }));

    let claim = submit_claim(store.as_ref(), &env, &Caller::user(&winner), request.clone()).unwrap();
    assert_eq!(claim.prize_amount, 500);
    let err = submit_claim(store.as_ref(), &env, &Caller::user(&winner), request).unwrap_err();
    assert!(matches!(err, DistributorError::ClaimAlreadyExists { .. }));

    let admin = Caller::admin("ops");
    for status in [ClaimStatus::Approved, ClaimStatus::Fulfilled] {
        update_claim_status(
            store.as_ref(),
            notifier.as_ref(),
            &env,
            &admin,
            &claim.id,
            UpdateClaimStatusRequest { status, note: None },
        )
        .unwrap();
    }
    let stored = store.get_draw(&week).unwrap().unwrap();
    assert_eq!(
        stored.winner(&winner).unwrap().claim_status,
        Some(ClaimStatus::Fulfilled)
    );
    assert_eq!(notifier.count("claim_status_changed"), 2);
}

#[tokio::test]
async fn test_unreachable_beacon_fails_then_backup_recovers() {
    let store = Arc::new(SqlStore::open_in_memory().unwrap());
    let gateway = RazorpayClient::new(mock_razorpay().await, KEY_ID, KEY_SECRET).unwrap();
    let notifier = Arc::new(MemoryNotifier::new());
    let executor = DrawExecutor::new(
        store.clone(),
        Arc::new(DrandBeacon::new(DEAD_URL, ChainInfo::quicknet()).unwrap()),
        Arc::new(OsRandomness),
        notifier.clone(),
    )
    .with_backoff_ms(0);

    let env = Env::at(round_time());
    let week = env.week();
    let signup = Env::at(env.now - Duration::hours(2));
    register(store.as_ref(), &signup, "amy", None);
    subscribe(store.as_ref(), &gateway, &signup, "amy").await;

    save_settings(
        store.as_ref(),
        DrawSettings {
            backup_draw_enabled: false,
            max_draw_attempts: 2,
            notification_email: ADMIN_EMAIL.to_string(),
            ..DrawSettings::default()
        },
    );
    let err = executor.run(&env, week, RunTrigger::Admin).await.unwrap_err();
    assert!(matches!(
        err,
        DistributorError::RandomnessUnavailable { attempts: 2, .. }
    ));
    let failed = store.get_draw(&week).unwrap().unwrap();
    assert_eq!(failed.status, DrawStatus::Failed);
    assert_eq!(failed.attempts, 2);
    assert!(failed.failure_reason.is_some());
    assert_eq!(notifier.count("draw_failed"), 1);

    // A failed week may be re-run once the backup is allowed
    save_settings(
        store.as_ref(),
        DrawSettings {
            max_draw_attempts: 1,
            ..DrawSettings::default()
        },
    );
    let draw = executor.run(&env, week, RunTrigger::Admin).await.unwrap();
    assert_eq!(draw.status, DrawStatus::Completed);
    assert_eq!(draw.randomness_source.as_deref(), Some("os_rng"));
    assert_eq!(draw.winners[0].uid, "amy");
}

#[tokio::test]
async fn test_scheduled_run_respects_disabled_switch() {
    let store = Arc::new(SqlStore::open_in_memory().unwrap());
    let executor = DrawExecutor::new(
        store.clone(),
        Arc::new(FixedSource([7; 32])),
        Arc::new(OsRandomness),
        Arc::new(MemoryNotifier::new()),
    );
    save_settings(
        store.as_ref(),
        DrawSettings {
            enabled: false,
            ..DrawSettings::default()
        },
    );

    let env = Env::at(round_time());
    let err = executor
        .run(&env, env.week(), RunTrigger::Scheduled)
        .await
        .unwrap_err();
    assert!(matches!(err, DistributorError::DrawsDisabled));
    assert!(store.get_draw(&env.week()).unwrap().is_none());

    // An admin run goes ahead but finds nobody to draw from
    let err = executor
        .run(&env, env.week(), RunTrigger::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, DistributorError::NoEligibleEntrants { .. }));
    assert_eq!(
        store.get_draw(&env.week()).unwrap().unwrap().status,
        DrawStatus::Failed
    );
}

// ─── Sync ───

#[tokio::test]
async fn test_document_primary_syncs_into_sql() {
    let dir = tempfile::tempdir().unwrap();
    let documents = Arc::new(DocumentStore::open(dir.path().join("export")).unwrap());
    let gateway = RazorpayClient::new(mock_razorpay().await, KEY_ID, KEY_SECRET).unwrap();
    let executor = DrawExecutor::new(
        documents.clone(),
        Arc::new(FixedSource([42; 32])),
        Arc::new(OsRandomness),
        Arc::new(MemoryNotifier::new()),
    );

    let env = Env::at(round_time());
    let signup = Env::at(env.now - Duration::days(2));
    for uid in ["amy", "bob"] {
        register(documents.as_ref(), &signup, uid, None);
        subscribe(documents.as_ref(), &gateway, &signup, uid).await;
    }
    let draw = executor.run(&env, env.week(), RunTrigger::Admin).await.unwrap();
    submit_claim(
        documents.as_ref(),
        &env,
        &Caller::user(&draw.winners[0].uid),
        SubmitClaimRequest {
            week: env.week(),
            payout_details: "upi: winner@bank".to_string(),
        },
    )
    .unwrap();

    let sql = SqlStore::open_in_memory().unwrap();
    let inserted: u64 = sync_all(&documents, &sql)
        .into_iter()
        .map(|(_, report)| report.unwrap().inserted)
        .sum();
    // two users, two subscriptions, one draw, one claim
    assert_eq!(inserted, 6);

    assert_eq!(
        draw_history(&sql, None).unwrap(),
        draw_history(documents.as_ref(), None).unwrap()
    );
    assert_eq!(sql.list_users().unwrap(), documents.list_users().unwrap());
    assert_eq!(sql.list_claims().unwrap(), documents.list_claims().unwrap());

    // A second pass changes nothing
    for (collection, report) in sync_all(&documents, &sql) {
        let report = report.unwrap();
        assert_eq!((report.inserted, report.updated), (0, 0), "{collection}");
    }
}

// ─── HTTP API ───

struct TestApi {
    base: String,
    http: reqwest::Client,
}

impl TestApi {
    async fn start() -> Self {
        let store = Arc::new(SqlStore::open_in_memory().unwrap());
        let gateway = RazorpayClient::new(mock_razorpay().await, KEY_ID, KEY_SECRET).unwrap();
        let beacon = DrandBeacon::new(mock_drand().await, ChainInfo::quicknet()).unwrap();
        let executor = DrawExecutor::new(
            store.clone(),
            Arc::new(beacon),
            Arc::new(OsRandomness),
            Arc::new(MemoryNotifier::new()),
        )
        .with_backoff_ms(0);
        let state = AppState::new(
            store,
            Arc::new(gateway),
            Arc::new(executor),
            HubConfig::default(),
            AuthConfig {
                admin_emails: vec![ADMIN_EMAIL.to_string()],
                dev_mode: true,
            },
        );
        let base = serve(build_router(state, cors_layer(None).unwrap())).await;
        Self {
            base,
            http: reqwest::Client::new(),
        }
    }

    fn get(&self, uid: Option<&str>, path: &str) -> reqwest::RequestBuilder {
        self.with_uid(self.http.get(format!("{}{path}", self.base)), uid)
    }

    fn post(&self, uid: Option<&str>, path: &str) -> reqwest::RequestBuilder {
        self.with_uid(self.http.post(format!("{}{path}", self.base)), uid)
    }

    fn with_uid(&self, request: reqwest::RequestBuilder, uid: Option<&str>) -> reqwest::RequestBuilder {
        match uid {
            Some(uid) => request.header("x-user-uid", uid),
            None => request,
        }
    }
}

async fn send(request: reqwest::RequestBuilder) -> (u16, Value) {
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_http_identity_and_settings() {
    let api = TestApi::start().await;

    let (status, body) = send(api.get(None, "/healthz")).await;
    assert_eq!((status, body["status"].as_str()), (200, Some("ok")));

    let (status, body) = send(api.get(None, "/api/user/profile")).await;
    assert_eq!(status, 401);
    assert!(body["error"].as_str().unwrap().contains("x-user-uid"));

    let (status, _) = send(api.get(Some("amy"), "/api/user/profile")).await;
    assert_eq!(status, 404);

    for (uid, email) in [("amy", "amy@example.com"), ("ops", ADMIN_EMAIL)] {
        let (status, body) = send(
            api.post(Some(uid), "/api/user/profile")
                .json(&json!({ "email": email, "display_name": uid })),
        )
        .await;
        assert_eq!(status, 200, "{body}");
        assert_eq!(body["uid"], uid);
    }

    let (status, _) = send(api.get(Some("amy"), "/api/settings/draw")).await;
    assert_eq!(status, 403);

    let (status, body) = send(api.get(Some("ops"), "/api/settings/draw")).await;
    assert_eq!(status, 200);
    assert_eq!(body["config"]["draw_percentage"], 50);

    // Development identity header
    let (status, _) = send(
        api.http
            .get(format!("{}/api/settings/draw", api.base))
            .header("x-dev-user-email", ADMIN_EMAIL),
    )
    .await;
    assert_eq!(status, 200);

    let (status, body) = send(api.post(Some("ops"), "/api/settings/draw").json(&json!({
        "config": { "draw_percentage": 50, "profit_percentage": 30, "maintenance_percentage": 25 }
    })))
    .await;
    assert_eq!(status, 400);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Percentages must sum to 100%"));

    let (status, body) = send(api.post(Some("ops"), "/api/settings/draw").json(&json!({
        "settings": { "draw_day": 3, "draw_hour": 9 }
    })))
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["settings"]["draw_day"], 3);
    assert_eq!(body["config"]["maintenance_percentage"], 20);

    let (status, body) = send(
        api.post(Some("amy"), "/api/user/profile")
            .header("content-type", "application/json")
            .body("{not json"),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());

    let (status, _) = send(api.get(Some("bob"), "/api/user/subscription/amy")).await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn test_http_subscribe_draw_and_claim() {
    let api = TestApi::start().await;
    for (uid, email) in [("amy", "amy@example.com"), ("ops", ADMIN_EMAIL)] {
        let (status, _) = send(
            api.post(Some(uid), "/api/user/profile")
                .json(&json!({ "email": email, "display_name": "Amy" })),
        )
        .await;
        assert_eq!(status, 200);
    }

    // Subscribe
    let (status, order) = send(api.post(Some("amy"), "/api/create-subscription-order")).await;
    assert_eq!(status, 200, "{order}");
    assert_eq!(order["amount"], 4900);
    assert_eq!(order["key_id"], KEY_ID);
    let order_id = order["order_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        api.post(Some("amy"), "/api/verify-subscription-payment")
            .json(&json!({
                "razorpay_order_id": order_id,
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": "00ff",
            })),
    )
    .await;
    assert_eq!(status, 400);

    let signature = payment_signature(KEY_SECRET, &order_id, "pay_1").unwrap();
    let (status, body) = send(
        api.post(Some("amy"), "/api/verify-subscription-payment")
            .json(&json!({
                "razorpay_order_id": order_id,
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": signature,
            })),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["active"], true);

    let (status, _) = send(api.post(Some("amy"), "/api/create-subscription-order")).await;
    assert_eq!(status, 409);

    let (status, body) = send(api.get(Some("amy"), "/api/user/subscription/amy")).await;
    assert_eq!((status, body["status"].as_str()), (200, Some("active")));

    // Draw
    let (status, _) = send(api.post(Some("amy"), "/api/draws/run")).await;
    assert_eq!(status, 403);

    // The mock beacon has no round for today, so the backup source steps in
    let (status, draw) = send(api.post(Some("ops"), "/api/draws/run")).await;
    assert_eq!(status, 200, "{draw}");
    assert_eq!(draw["status"], "completed");
    assert_eq!(draw["randomness_source"], "os_rng");
    assert_eq!(draw["winners"][0]["uid"], "amy");
    let week = draw["week"].as_str().unwrap().to_string();

    let (status, _) = send(
        api.post(Some("ops"), "/api/draws/run")
            .json(&json!({ "week": week })),
    )
    .await;
    assert_eq!(status, 409);

    let (status, body) = send(api.get(None, "/api/draws/history?limit=5")).await;
    assert_eq!(status, 200);
    assert_eq!(body["draws"].as_array().unwrap().len(), 1);

    let (status, body) = send(api.get(None, "/api/draws/winners")).await;
    assert_eq!(status, 200);
    assert_eq!(body["winners"][0]["display_name"], "Amy");

    let (status, body) = send(api.get(None, &format!("/api/draws/{week}/verify/amy"))).await;
    assert_eq!((status, &body["included"]), (200, &json!(true)));
    let (status, _) = send(api.get(None, "/api/draws/last-week/verify/amy")).await;
    assert_eq!(status, 400);

    // Claim
    let claim_body = json!({ "week": week, "payout_details": "upi: amy@bank" });
    let (status, claim) = send(api.post(Some("amy"), "/api/claims").json(&claim_body)).await;
    assert_eq!(status, 201, "{claim}");
    assert_eq!(claim["status"], "submitted");
    let (status, _) = send(api.post(Some("amy"), "/api/claims").json(&claim_body)).await;
    assert_eq!(status, 409);

    let (status, body) = send(api.get(Some("amy"), "/api/claims")).await;
    assert_eq!((status, body.as_array().unwrap().len()), (200, 1));

    let status_path = format!("/api/claims/{}/status", claim["id"].as_str().unwrap());
    let (status, _) = send(
        api.post(Some("amy"), &status_path)
            .json(&json!({ "status": "approved" })),
    )
    .await;
    assert_eq!(status, 403);
    let (status, body) = send(
        api.post(Some("ops"), &status_path)
            .json(&json!({ "status": "approved", "note": "paid friday" })),
    )
    .await;
    assert_eq!((status, body["status"].as_str()), (200, Some("approved")));
    let (status, _) = send(
        api.post(Some("ops"), &status_path)
            .json(&json!({ "status": "submitted" })),
    )
    .await;
    assert_eq!(status, 409);

    let (status, body) = send(api.get(Some("amy"), "/api/draws/wins/amy")).await;
    assert_eq!(status, 200);
    assert_eq!(body["total_wins"], 1);
    assert_eq!(body["wins"][0]["claim_status"], "approved");
}

#[tokio::test]
async fn test_gateway_outage_surfaces_as_bad_gateway() {
    let store = Arc::new(SqlStore::open_in_memory().unwrap());
    let gateway = RazorpayClient::new(DEAD_URL, KEY_ID, KEY_SECRET).unwrap();
    let env = Env::now();
    register(store.as_ref(), &env, "amy", None);

    let err = create_subscription_order(
        store.as_ref(),
        &gateway,
        &HubConfig::default(),
        &env,
        &Caller::user("amy"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, HubError::Gateway { .. }));
    assert!(store.get_subscription("amy").unwrap().is_none());
}
