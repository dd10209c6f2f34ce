//! # L402 Paywall
//!
//! A framework-agnostic HTTP paywall implementation for the L402 payment protocol.
//!
//! This crate provides [`PayWall`](paywall::PayWall), a composable middleware that protects
//! HTTP resources with Lightning payments. It answers unauthenticated requests with a
//! payment challenge and verifies presented credentials through an
//! [`L402Engine`](l402_core::L402Engine).
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use l402_core::{EngineConfig, L402Engine, backend::SimulatedBackend, types::Amount};
//! use l402_paywall::paywall::PayWall;
//!
//! let engine = L402Engine::builder()
//!     .backend(SimulatedBackend::new())
//!     .config(
//!         EngineConfig::builder()
//!             .backend_timeout(Duration::from_secs(10))
//!             .build(),
//!     )
//!     .build();
//!
//! let paywall = PayWall::builder()
//!     .engine(engine)
//!     .price(Amount::try_from(1000u64).unwrap())
//!     .build();
//! ```
//!
//! ## Modules
//!
//! - [`paywall`]: The main [`PayWall`](paywall::PayWall) struct and payment flow logic.
//! - [`processor`]: [`RequestProcessor`](processor::RequestProcessor) and
//!   [`PaymentState`](processor::PaymentState).
//! - [`errors`]: HTTP error responses.
//!
//! ## Framework Integration
//!
//! With the `axum` feature, `PayWall` is a tower `Layer`:
//!
//! ```rust,ignore
//! let app = Router::new().route("/protected", get(handler).layer(paywall));
//! ```
//!
//! ## Error Handling
//!
//! [`ErrorResponse`](errors::ErrorResponse) implements `IntoResponse` for Axum. It returns:
//!
//! - `402 Payment Required`: No credentials provided, with a fresh challenge.
//! - `401 Unauthorized`: Wrong scheme, or an invalid credential/proof pair.
//! - `500 Internal Server Error`: Payment backend or internal failures.

#[cfg(feature = "axum")]
pub mod axum;
pub mod errors;
pub mod paywall;
pub mod processor;
