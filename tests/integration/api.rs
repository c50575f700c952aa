use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tower::ServiceExt;

use wagerbook::api::build_router;
use wagerbook::api::routes::ServiceState;
use wagerbook::catalog::{CatalogLimits, CatalogReader};
use wagerbook::engine::placement::BetService;
use wagerbook::engine::validator::BettingRules;
use wagerbook::storage::sqlite::SqliteStore;
use wagerbook::storage::LedgerStore;

use crate::fixtures::{catalog, STORE_TIMEOUT};

async fn app() -> (axum::Router, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    for m in catalog(Utc::now()) {
        store.upsert_match(&m).await.unwrap();
    }
    store.set_balance("grace", dec!(1000), Utc::now()).await.unwrap();

    let state = Arc::new(ServiceState {
        catalog: CatalogReader::new(store.clone(), CatalogLimits::default(), STORE_TIMEOUT),
        bets: BetService::new(store.clone(), store.clone(), BettingRules::default(), STORE_TIMEOUT),
    });
    (build_router(state), store)
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_bet(user: &str, key: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/bets")
        .header("content-type", "application/json")
        .header("x-user-id", user);
    if let Some(key) = key {
        builder = builder.header("idempotency-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

const TWO_LEGS: &str = r#"{
    "selections": [
        {"matchId": "NPFL-1", "market": "1X2", "selection": "home", "odd": 1.8},
        {"matchId": "NPFL-2", "market": "1X2", "selection": "away", "odd": 2.0}
    ],
    "stake": 100
}"#;

#[tokio::test]
async fn test_upcoming_listing_over_http() {
    let (app, _) = app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/matches?status=upcoming&limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = json_body(resp).await;
    let ids: Vec<&str> = json["matches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["matchId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["NPFL-1"]);
}

#[tokio::test]
async fn test_place_then_replay_over_http() {
    let (app, store) = app().await;

    let resp = app
        .clone()
        .oneshot(post_bet("grace", Some("slip-1"), TWO_LEGS))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let first = json_body(resp).await;
    assert_eq!(first["replayed"], false);

    let resp = app
        .oneshot(post_bet("grace", Some("slip-1"), TWO_LEGS))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let second = json_body(resp).await;
    assert_eq!(second["replayed"], true);
    assert_eq!(first["betId"], second["betId"]);

    let account = store.get_account("grace").await.unwrap().unwrap();
    assert_eq!(account.balance, dec!(900));
}

#[tokio::test]
async fn test_reused_key_is_422() {
    let (app, store) = app().await;

    let resp = app
        .clone()
        .oneshot(post_bet("grace", Some("slip-2"), TWO_LEGS))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let other = r#"{"selections":[{"matchId":"NPFL-2","market":"1X2","selection":"home"}],"stake":300}"#;
    let resp = app
        .oneshot(post_bet("grace", Some("slip-2"), other))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(resp).await;
    assert_eq!(json["error"]["code"], "idempotency_key_reused");
    assert_eq!(json["error"]["retryable"], false);

    let account = store.get_account("grace").await.unwrap().unwrap();
    assert_eq!(account.balance, dec!(900));
}

#[tokio::test]
async fn test_insufficient_funds_over_http() {
    let (app, _) = app().await;
    let resp = app.oneshot(post_bet("henry", None, TWO_LEGS)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json = json_body(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "insufficient_funds");
    assert_eq!(json["error"]["message"], "Insufficient balance. Please deposit funds.");
}

#[tokio::test]
async fn test_suspended_match_names_status() {
    let (app, _) = app().await;
    let body = r#"{"selections":[{"matchId":"EPL-1","market":"1X2","selection":"draw"}],"stake":250}"#;
    let resp = app.oneshot(post_bet("grace", None, body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json = json_body(resp).await;
    assert_eq!(json["error"]["code"], "match_not_open");
    let message = json["error"]["message"].as_str().unwrap();
    assert!(message.contains("Arsenal vs Chelsea"));
    assert!(message.contains("suspended"));
}
