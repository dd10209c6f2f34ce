//! HTTP routes of the L402 server.
//!
//! - `POST /api/request-access`: issue a challenge for a catalog product.
//! - `GET /api/protected-data`: the paid resource, behind a [`PayWall`].
//! - `GET /health`: liveness.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    backend::PaymentBackend,
    catalog::Catalog,
    engine::L402Engine,
    paywall::{errors::ErrorResponse, paywall::PayWall, processor::PaymentState},
    types::Amount,
};

/// Shared state of the server routes.
pub struct AppState<B: PaymentBackend> {
    pub engine: L402Engine<B>,
    pub catalog: Arc<Catalog>,
}

impl<B: PaymentBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        AppState {
            engine: self.engine.clone(),
            catalog: Arc::clone(&self.catalog),
        }
    }
}

/// Body of `POST /api/request-access`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub product_id: u64,
}

/// Build the server router.
///
/// Clients without credentials on the protected route are challenged for
/// `protected_price`.
pub fn router<B: PaymentBackend>(engine: L402Engine<B>, catalog: Catalog, protected_price: Amount) -> Router {
    let paywall = PayWall::builder()
        .engine(engine.clone())
        .price(protected_price)
        .build();

    let state = AppState {
        engine,
        catalog: Arc::new(catalog),
    };

    Router::new()
        .route("/api/request-access", post(request_access::<B>))
        .route(
            "/api/protected-data",
            get(protected_data::<B>).layer(paywall),
        )
        .route("/health", get(health))
        .with_state(state)
}

async fn request_access<B: PaymentBackend>(
    State(state): State<AppState<B>>,
    Json(request): Json<AccessRequest>,
) -> Response {
    let Some(product) = state.catalog.product(request.product_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "message": "Product not found",
                "code": "product_not_found",
            })),
        )
            .into_response();
    };

    match state.engine.issue_challenge(product.price).await {
        Ok(challenge) => {
            #[cfg(feature = "tracing")]
            tracing::info!(
                product_id = product.id,
                payment_hash = %challenge.payment_hash,
                amount = product.price.sats(),
                "Issued challenge"
            );
            ErrorResponse::payment_required(&challenge).into_response()
        }
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::error!(product_id = product.id, "Failed to issue challenge: {err}");
            ErrorResponse::from_error(&err).into_response()
        }
    }
}

async fn protected_data<B: PaymentBackend>(
    State(state): State<AppState<B>>,
    Extension(_payment): Extension<PaymentState>,
) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": state.catalog.protected_data,
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
