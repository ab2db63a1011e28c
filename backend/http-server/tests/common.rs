#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::{str::FromStr, sync::Arc};

use axum::Router;
use domain_types::contestant::Contestant;
use gateway_integration::fonepay::{dv, verification::MerchantApiParams};
use http::{HeaderMap, StatusCode};
use http_server::{
    app::{self, AppState},
    configs, logger,
};
use rust_decimal::Decimal;
use storage::InMemoryStore;
use tower::ServiceExt;

pub const SECRET: &str = "test-dv-secret";
pub const MERCHANT_ID: &str = "NBQM";

pub fn test_config(sandbox: bool, api: Option<MerchantApiParams>) -> configs::Config {
    configs::Config {
        common: configs::Common {
            environment: "development".to_string(),
        },
        server: configs::Server {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        metrics: configs::MetricsServer {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        log: logger::LogConfig {
            console: logger::ConsoleLogConfig {
                enabled: false,
                level: logger::LogLevel::Warn,
                log_format: logger::LogFormat::Default,
                filtering_directive: None,
            },
        },
        gateway: configs::GatewayConfig {
            base_url: "https://dev-clientapi.fonepay.com/api/merchantRequest".to_string(),
            merchant_id: MERCHANT_ID.to_string(),
            secret_key: SECRET.to_string(),
            sandbox,
            public_base_url: "http://localhost:8000".to_string(),
            status_page_url: "http://localhost:3000/payment/status".to_string(),
            currency: "NPR".to_string(),
            api,
        },
        voting: configs::VotingConfig {
            unit_price_per_vote: Decimal::from_str("1.00").unwrap(),
            contestants: Vec::new(),
        },
    }
}

/// App state over a fresh in-memory store seeded with contestants C1..C3.
pub async fn seeded_state(config: configs::Config) -> (AppState, InMemoryStore) {
    let store = InMemoryStore::new();
    store
        .seed_contestants(["C1", "C2", "C3"].map(|id| Contestant {
            id: id.to_string(),
            name: format!("Contestant {id}"),
            vote_total: 0,
        }))
        .await;
    let state = AppState::with_store(Arc::new(config), store.clone());
    (state, store)
}

pub async fn sandbox_router() -> (Router, InMemoryStore) {
    let (state, store) = seeded_state(test_config(true, None)).await;
    (app::router(state), store)
}

/// A fully signed, successful return callback for the given PRN and paid
/// amount, as the query string the gateway would redirect with.
pub fn success_callback_uri(prn: &str, paid: &str) -> String {
    signed_callback_uri(prn, MERCHANT_ID, "true", "successful", paid)
}

pub fn signed_callback_uri(prn: &str, pid: &str, ps: &str, rc: &str, paid: &str) -> String {
    let uid = "TX901";
    let bc = "NICENPKA";
    let ini = "WEB";
    let refund = "0.00";
    let digest = dv::sign(SECRET, &[prn, pid, ps, rc, uid, bc, ini, paid, refund]).unwrap();
    format!(
        "/api/payments/return?PRN={prn}&PID={pid}&PS={ps}&RC={rc}&UID={uid}&BC={bc}&INI={ini}&P_AMT={paid}&R_AMT={refund}&DV={digest}"
    )
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, bytes::Bytes) {
    let response = router
        .clone()
        .oneshot(
            http::Request::builder()
                .uri(uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

pub async fn post_json(
    router: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, HeaderMap, bytes::Bytes) {
    let response = router
        .clone()
        .oneshot(
            http::Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(axum::body::Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

pub fn json_body(body: &bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

pub fn location(headers: &HeaderMap) -> String {
    headers
        .get(http::header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

pub async fn vote_total(store: &InMemoryStore, id: &str) -> u64 {
    storage::ContestantStore::find(store, id)
        .await
        .unwrap()
        .unwrap()
        .vote_total
}

/// Create a session through the API; returns the PRN and the redirect URL.
pub async fn create_session(router: &Router, body: serde_json::Value) -> (String, String) {
    let (status, _, bytes) = post_json(router, "/api/payments", body).await;
    assert_eq!(status, StatusCode::OK);
    let json = json_body(&bytes);
    (
        json["prn"].as_str().unwrap().to_string(),
        json["redirectUrl"].as_str().unwrap().to_string(),
    )
}
