use std::time::Duration;

use axum::{
    Extension, Json, Router,
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    routing::get,
};
use http_body_util::BodyExt;
use l402_core::{
    EngineConfig, L402Engine,
    backend::SimulatedBackend,
    types::{Amount, PaymentHash},
};
use l402_paywall::{paywall::PayWall, processor::PaymentState};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(backend: SimulatedBackend) -> Router {
    let engine = L402Engine::builder()
        .backend(backend)
        .config(
            EngineConfig::builder()
                .backend_timeout(Duration::from_secs(1))
                .build(),
        )
        .build();

    let paywall = PayWall::builder()
        .engine(engine)
        .price(Amount::try_from(1000u64).unwrap())
        .build();

    Router::new().route("/resource", get(resource).layer(paywall))
}

async fn resource(Extension(state): Extension<PaymentState>) -> Json<Value> {
    Json(json!({
        "message": "You have accessed a protected resource!",
        "paymentHash": state.verified.map(|v| v.payment_hash.to_hex()),
    }))
}

fn request(authorization: Option<&str>, macaroon: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/resource");
    if let Some(authorization) = authorization {
        builder = builder.header("Authorization", authorization);
    }
    if let Some(macaroon) = macaroon {
        builder = builder.header("L402-Macaroon", macaroon);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Pull the payment hash out of `L402 token="<hash>"`.
fn token_of(www_authenticate: &str) -> PaymentHash {
    www_authenticate
        .trim_start_matches("L402 token=\"")
        .trim_end_matches('"')
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_missing_credentials_get_a_challenge() {
    let backend = SimulatedBackend::new();
    let response = app(backend.clone()).oneshot(request(None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let headers = response.headers().clone();
    let www_authenticate = headers["www-authenticate"].to_str().unwrap().to_string();
    assert!(www_authenticate.starts_with("L402 token=\""));
    assert!(headers["l402-invoice"].to_str().unwrap().starts_with("lnsim1000"));
    assert_eq!(headers["l402-macaroon"].to_str().unwrap().len(), 64);

    let body = json_body(response).await;
    assert_eq!(body["code"], "challenge_required");
    assert_eq!(body["headers"]["WWW-Authenticate"], www_authenticate.as_str());

    let payment_hash = token_of(&www_authenticate);
    assert_eq!(backend.amount_of(&payment_hash).map(|a| a.sats()), Some(1000));
}

#[tokio::test]
async fn test_paid_request_reaches_handler() {
    let backend = SimulatedBackend::new();
    let app = app(backend.clone());

    let challenge = app.clone().oneshot(request(None, None)).await.unwrap();
    let payment_hash = token_of(challenge.headers()["www-authenticate"].to_str().unwrap());
    let macaroon = challenge.headers()["l402-macaroon"]
        .to_str()
        .unwrap()
        .to_string();

    // Not paid yet.
    let unpaid = app
        .clone()
        .oneshot(request(Some("L402 "), Some(&macaroon)))
        .await
        .unwrap();
    assert_eq!(unpaid.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(unpaid).await["code"], "authentication_failed");

    backend.settle(&payment_hash);
    let proof = backend.preimage_of(&payment_hash).unwrap().to_hex();
    let authorization = format!("L402 {proof}");

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request(Some(&authorization), Some(&macaroon)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await["paymentHash"],
            payment_hash.to_hex()
        );
    }
}

#[tokio::test]
async fn test_wrong_scheme_is_unauthorized() {
    let response = app(SimulatedBackend::new())
        .oneshot(request(Some("Bearer abc"), Some("c0ffee")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get("l402-invoice").is_none());
    assert_eq!(json_body(response).await["code"], "invalid_scheme");
}

#[tokio::test]
async fn test_unknown_credential_is_unauthorized() {
    let response = app(SimulatedBackend::new())
        .oneshot(request(Some(&format!("L402 {}", "00".repeat(32))), Some("feedface")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_backend_outage_is_a_server_error() {
    let backend = SimulatedBackend::new();
    let app = app(backend.clone());

    let challenge = app.clone().oneshot(request(None, None)).await.unwrap();
    let macaroon = challenge.headers()["l402-macaroon"]
        .to_str()
        .unwrap()
        .to_string();

    backend.set_unavailable(true);
    let response = app
        .clone()
        .oneshot(request(Some("L402 00"), Some(&macaroon)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["code"], "backend_unavailable");

    // A challenge cannot be issued either.
    let response = app.oneshot(request(None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get("www-authenticate").is_none());
}
