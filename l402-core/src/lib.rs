//! L402 core library.
//!
//! This library provides the core types, the payment backend contract and the
//! challenge/verification engine for the L402 protocol.

pub mod backend;
pub mod engine;
pub mod errors;
pub mod store;
pub mod transport;
pub mod types;

pub use engine::{EngineConfig, L402Engine, VerifiedPayment};
