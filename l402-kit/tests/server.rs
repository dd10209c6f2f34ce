use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
    response::Response,
};
use http_body_util::BodyExt;
use l402_kit::{
    backend::SimulatedBackend,
    catalog::Catalog,
    engine::{EngineConfig, L402Engine},
    server,
    types::{Amount, PaymentHash},
};
use serde_json::{Value, json};
use tower::ServiceExt;

fn catalog() -> Catalog {
    json!({
        "products": [
            { "id": 1, "name": "Report", "price": 1000 },
            { "id": 2, "name": "Dataset", "price": 5000 }
        ],
        "protected_data": { "answer": 42 }
    })
    .to_string()
    .parse()
    .unwrap()
}

fn app(backend: SimulatedBackend) -> Router {
    let engine = L402Engine::builder()
        .backend(backend)
        .config(
            EngineConfig::builder()
                .backend_timeout(Duration::from_secs(1))
                .credential_ttl(Duration::from_secs(3600))
                .build(),
        )
        .build();

    server::router(engine, catalog(), Amount::try_from(100u64).unwrap())
}

fn request_access(product_id: u64) -> Request<Body> {
    Request::post("/api/request-access")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "productId": product_id }).to_string()))
        .unwrap()
}

fn protected_data(authorization: &str, macaroon: &str) -> Request<Body> {
    Request::get("/api/protected-data")
        .header("Authorization", authorization)
        .header("L402-Macaroon", macaroon)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn payment_hash_of(body: &Value) -> PaymentHash {
    body["headers"]["WWW-Authenticate"]
        .as_str()
        .unwrap()
        .trim_start_matches("L402 token=\"")
        .trim_end_matches('"')
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_request_access_then_fetch_protected_data() {
    let backend = SimulatedBackend::new();
    let app = app(backend.clone());

    let response = app.clone().oneshot(request_access(2)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(response.headers().contains_key("l402-invoice"));

    let body = json_body(response).await;
    let payment_hash = payment_hash_of(&body);
    let macaroon = body["headers"]["L402-Macaroon"].as_str().unwrap().to_string();
    assert_eq!(backend.amount_of(&payment_hash).map(|a| a.sats()), Some(5000));

    backend.settle(&payment_hash);
    let proof = backend.preimage_of(&payment_hash).unwrap().to_hex();

    let response = app
        .oneshot(protected_data(&format!("L402 {proof}"), &macaroon))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "data": { "answer": 42 } })
    );
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let backend = SimulatedBackend::new();
    let response = app(backend.clone()).oneshot(request_access(99)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["message"], "Product not found");
    assert_eq!(backend.invoice_count(), 0);
}

#[tokio::test]
async fn test_protected_data_without_credentials_is_challenged() {
    let backend = SimulatedBackend::new();
    let response = app(backend.clone())
        .oneshot(
            Request::get("/api/protected-data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let payment_hash = payment_hash_of(&json_body(response).await);
    assert_eq!(backend.amount_of(&payment_hash).map(|a| a.sats()), Some(100));
}

#[tokio::test]
async fn test_wrong_proof_is_unauthorized() {
    let backend = SimulatedBackend::new();
    let app = app(backend.clone());

    let body = json_body(app.clone().oneshot(request_access(1)).await.unwrap()).await;
    let payment_hash = payment_hash_of(&body);
    let macaroon = body["headers"]["L402-Macaroon"].as_str().unwrap().to_string();
    backend.settle(&payment_hash);

    let response = app
        .oneshot(protected_data(&format!("L402 {}", "ff".repeat(32)), &macaroon))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health() {
    let response = app(SimulatedBackend::new())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}
