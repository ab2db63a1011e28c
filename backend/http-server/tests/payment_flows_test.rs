#![allow(clippy::unwrap_used)]

use http::StatusCode;
use serde_json::json;

mod common;

use common::{
    create_session, get, json_body, location, sandbox_router, success_callback_uri, vote_total,
};

#[tokio::test]
async fn single_vote_success_in_sandbox_mode() {
    let (router, store) = sandbox_router().await;

    let (prn, redirect_url) = create_session(
        &router,
        json!({ "amount": "5.00", "vote": 5, "contestant": "C1" }),
    )
    .await;
    assert!(prn.starts_with("prn_"));
    assert!(redirect_url.contains(&format!("PRN={prn}")));
    assert!(redirect_url.contains("AMT=5.00"));
    assert!(redirect_url.contains("CRN=NPR"));
    assert!(redirect_url.contains("DV="));

    let (status, headers, _) = get(&router, &success_callback_uri(&prn, "5.00")).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location(&headers);
    assert!(location.contains(&format!("prn={prn}")));
    assert!(!location.contains("error="));

    assert_eq!(vote_total(&store, "C1").await, 5);

    let (status, headers, body) = get(&router, &format!("/api/payments/status/{prn}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("cache-control").unwrap(), "no-store");
    let session = json_body(&body);
    assert_eq!(session["status"], "success");
    assert_eq!(session["verificationStatus"], "skipped");
    assert_eq!(session["paidAmountRaw"], "5.00");
}

#[tokio::test]
async fn replayed_callbacks_credit_exactly_once() {
    let (router, store) = sandbox_router().await;

    let (prn, _) = create_session(
        &router,
        json!({ "amount": "5.00", "vote": 5, "contestant": "C1" }),
    )
    .await;

    let uri = success_callback_uri(&prn, "5.00");
    for _ in 0..4 {
        let (status, headers, _) = get(&router, &uri).await;
        assert_eq!(status, StatusCode::FOUND);
        assert!(!location(&headers).contains("error="));
    }

    assert_eq!(vote_total(&store, "C1").await, 5);
}

#[tokio::test]
async fn bulk_vote_success_credits_every_contestant() {
    let (router, store) = sandbox_router().await;

    let bulk = r#"{"i":[{"id":"C1","v":2},{"id":"C2","v":3}],"c":2,"t":5}"#;
    let (prn, _) = create_session(
        &router,
        json!({ "amount": "5.00", "vote": 5, "contestant": "C1", "r1": bulk }),
    )
    .await;

    let (status, headers, _) = get(&router, &success_callback_uri(&prn, "5.00")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert!(!location(&headers).contains("error="));

    assert_eq!(vote_total(&store, "C1").await, 2);
    assert_eq!(vote_total(&store, "C2").await, 3);
}

#[tokio::test]
async fn tampered_amount_blocks_crediting() {
    let (router, store) = sandbox_router().await;

    let (prn, _) = create_session(
        &router,
        json!({ "amount": "5.00", "vote": 5, "contestant": "C1" }),
    )
    .await;

    // The callback is legitimately signed, but for ten times the price.
    let (status, headers, _) = get(&router, &success_callback_uri(&prn, "50.00")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert!(location(&headers).contains("error=amount_mismatch"));

    assert_eq!(vote_total(&store, "C1").await, 0);

    let (_, _, body) = get(&router, &format!("/api/payments/status/{prn}")).await;
    assert_eq!(json_body(&body)["status"], "error");
}

#[tokio::test]
async fn unknown_reference_redirects_without_mutation() {
    let (router, store) = sandbox_router().await;

    let (prn, _) = create_session(
        &router,
        json!({ "amount": "5.00", "vote": 5, "contestant": "C1" }),
    )
    .await;

    let (status, headers, _) =
        get(&router, &success_callback_uri("prn_9999999999999", "5.00")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert!(location(&headers).contains("error=unknown_prn"));

    assert_eq!(vote_total(&store, "C1").await, 0);
    let (_, _, body) = get(&router, &format!("/api/payments/status/{prn}")).await;
    assert_eq!(json_body(&body)["status"], "created");
}

#[tokio::test]
async fn bare_reference_ids_are_normalized_on_lookup() {
    let (router, _) = sandbox_router().await;

    let (prn, _) = create_session(
        &router,
        json!({ "amount": "2.00", "vote": 2, "contestant": "C2", "prn": "424242" }),
    )
    .await;
    assert_eq!(prn, "prn_424242");

    let (status, _, body) = get(&router, "/api/payments/status/424242").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["referenceId"], "prn_424242");
}

#[tokio::test]
async fn session_creation_validates_input() {
    let (router, _) = sandbox_router().await;

    let (status, _, _) = common::post_json(
        &router,
        "/api/payments",
        json!({ "amount": "5.00", "vote": 5, "contestant": "C404" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = common::post_json(
        &router,
        "/api/payments",
        json!({ "amount": "9.00", "vote": 5, "contestant": "C1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = common::post_json(
        &router,
        "/api/payments",
        json!({ "amount": "0.00", "vote": 0, "contestant": "C1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_and_listing_reflect_settlements() {
    let (router, _) = sandbox_router().await;

    let (prn, _) = create_session(
        &router,
        json!({ "amount": "5.00", "vote": 5, "contestant": "C1" }),
    )
    .await;
    let _ = create_session(
        &router,
        json!({ "amount": "3.00", "vote": 3, "contestant": "C2", "prn": "stats2" }),
    )
    .await;

    let (status, _, _) = get(&router, &success_callback_uri(&prn, "5.00")).await;
    assert_eq!(status, StatusCode::FOUND);

    let (status, _, body) = get(&router, "/api/payments").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().unwrap().len(), 2);

    let (status, _, body) = get(&router, "/api/payments/stats").await;
    assert_eq!(status, StatusCode::OK);
    let stats = json_body(&body);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["success"], 1);
    assert_eq!(stats["created"], 1);
    assert_eq!(stats["votesSold"], 5);

    let (_, _, body) = get(&router, &format!("/api/payments/status/{prn}")).await;
    let internal_id = json_body(&body)["id"].as_str().unwrap().to_string();
    let (status, _, body) = get(&router, &format!("/api/payments/id/{internal_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["referenceId"], prn);
}
