use std::collections::BTreeMap;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use nextgoal_api::{create_router, services::vnpay::{canonicalize, SECURE_HASH}};
use serial_test::serial;
use tower::ServiceExt;

mod common;

use common::{body_json, create_test_app, create_test_state};

fn callback_params() -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("vnp_Amount".to_string(), "29900000".to_string());
    params.insert("vnp_ResponseCode".to_string(), "00".to_string());
    params.insert("vnp_TxnRef".to_string(), "17093012000042".to_string());
    params.insert("vnp_OrderInfo".to_string(), "Membership gold".to_string());
    params
}

#[tokio::test]
#[serial]
async fn ipn_with_bad_checksum_is_refused_without_lookup() {
    let app = create_test_app().await;
    let mut params = callback_params();
    params.insert(SECURE_HASH.to_string(), "deadbeef".to_string());

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/payment/vnpay_ipn?{}", canonicalize(&params)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["RspCode"], "97");
    assert_eq!(body["Message"], "Fail checksum");
}

#[tokio::test]
#[serial]
async fn return_with_valid_signature_redirects_to_success() {
    let state = create_test_state().await;
    let mut params = callback_params();
    let signature = state.vnpay.sign(&params).unwrap();
    params.insert(SECURE_HASH.to_string(), signature);
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/payment/vnpay_return?{}", canonicalize(&params)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:3000/payment/success"
    );
}

#[tokio::test]
#[serial]
async fn return_with_tampered_amount_redirects_to_cancel() {
    let state = create_test_state().await;
    let mut params = callback_params();
    let signature = state.vnpay.sign(&params).unwrap();
    params.insert(SECURE_HASH.to_string(), signature);
    params.insert("vnp_Amount".to_string(), "100".to_string());
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/payment/vnpay_return?{}", canonicalize(&params)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:3000/payment/cancel"
    );
}

#[tokio::test]
#[serial]
async fn payment_url_requires_sign_in() {
    let app = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/payment/create_payment_url")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"plan":"gold"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
