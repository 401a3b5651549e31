mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{post_identify, send, test_router};
use serde_json::json;

#[tokio::test]
async fn identify_walkthrough_consolidates_contacts() {
    let (router, store) = test_router().await;

    let (status, body) =
        post_identify(&router, json!({ "email": "a@x.com", "phoneNumber": "1" })).await;
    assert_eq!(status, StatusCode::OK);
    let primary = body["contact"]["primaryContactId"].as_i64().unwrap();
    assert_eq!(body["contact"]["emails"], json!(["a@x.com"]));
    assert_eq!(body["contact"]["phoneNumbers"], json!(["1"]));
    assert_eq!(body["contact"]["secondaryContactIds"], json!([]));

    let (status, body) = post_identify(&router, json!({ "phoneNumber": "1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contact"]["primaryContactId"], primary);
    assert_eq!(store.snapshot().await.len(), 1);

    let (status, body) =
        post_identify(&router, json!({ "email": "b@x.com", "phoneNumber": "1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contact"]["primaryContactId"], primary);
    assert_eq!(body["contact"]["emails"], json!(["a@x.com", "b@x.com"]));
    assert_eq!(body["contact"]["phoneNumbers"], json!(["1"]));
    assert_eq!(body["contact"]["secondaryContactIds"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn identify_accepts_numeric_phone_number() {
    let (router, _) = test_router().await;

    let (status, body) = post_identify(&router, json!({ "phoneNumber": 123456 })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contact"]["phoneNumbers"], json!(["123456"]));
    assert_eq!(body["contact"]["emails"], json!([]));
}

#[tokio::test]
async fn identify_merges_two_primaries() {
    let (router, _) = test_router().await;
    let (_, a) = post_identify(&router, json!({ "email": "e1" })).await;
    let (_, b) = post_identify(&router, json!({ "phoneNumber": "p2" })).await;

    let (status, merged) =
        post_identify(&router, json!({ "email": "e1", "phoneNumber": "p2" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        merged["contact"]["primaryContactId"],
        a["contact"]["primaryContactId"]
    );
    assert_eq!(
        merged["contact"]["secondaryContactIds"],
        json!([b["contact"]["primaryContactId"]])
    );
    assert_eq!(merged["contact"]["emails"], json!(["e1"]));
    assert_eq!(merged["contact"]["phoneNumbers"], json!(["p2"]));
}

#[tokio::test]
async fn identify_without_identifiers_is_bad_request() {
    let (router, store) = test_router().await;

    let (status, body) = post_identify(&router, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Either email or phoneNumber must be provided");

    let (status, _) = post_identify(&router, json!({ "email": null, "phoneNumber": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn identify_rejects_malformed_json() {
    let (router, store) = test_router().await;

    let request = Request::builder()
        .method("POST")
        .uri("/identify")
        .header("content-type", "application/json")
        .body(Body::from("{\"email\":"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(router, request).await.unwrap();

    assert!(response.status().is_client_error());
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn identify_is_idempotent_over_http() {
    let (router, store) = test_router().await;
    let payload = json!({ "email": "a@x.com", "phoneNumber": "1" });

    let (_, first) = post_identify(&router, payload.clone()).await;
    let (_, second) = post_identify(&router, payload).await;

    assert_eq!(first, second);
    assert_eq!(store.snapshot().await.len(), 1);
}

#[tokio::test]
async fn identify_rejects_get() {
    let (router, _) = test_router().await;

    let request = Request::builder()
        .uri("/identify")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
