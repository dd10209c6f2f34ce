//! # L402 Kit
//!
//! L402 Kit is a modular SDK for gating HTTP resources behind Lightning payments with the
//! L402 protocol, plus a reference server built from its parts.
//!
//! ## Related Crates
//!
//! - **[`l402-core`](https://docs.rs/l402-core)**: Protocol types, the payment backend contract and the
//!   challenge/verification engine. Re-exported below.
//! - **[`l402-paywall`](https://docs.rs/l402-paywall)**: A framework-agnostic HTTP paywall middleware
//!   built on the engine. Re-exported as [`paywall`].
//!
//! ## Components Overview
//!
//! - **[`engine`]**, **[`transport`]**, **[`types`]**, **[`errors`]**: The L402 protocol itself.
//! - **[`backend`]** and **[`store`]**: The seams of the engine: payment backends and state stores.
//! - **`lnd`**: A [`PaymentBackend`](backend::PaymentBackend) talking to an LND node over its REST API.
//! - **[`catalog`]**: Products and their prices, loaded from JSON.
//! - **[`config`]**: Server configuration, loaded from TOML.
//! - **`server`**: The axum routes of the `l402-server` binary.

pub mod engine {
    pub use l402_core::engine::*;
}

pub mod transport {
    pub use l402_core::transport::*;
}

pub mod types {
    pub use l402_core::types::*;
}

pub mod errors {
    pub use l402_core::errors::*;
}

pub mod backend {
    pub use l402_core::backend::*;
}

pub mod store {
    pub use l402_core::store::*;
}

pub use l402_paywall as paywall;

pub mod catalog;
pub mod config;

#[cfg(feature = "lnd-client")]
pub mod lnd;

#[cfg(feature = "axum")]
pub mod server;
