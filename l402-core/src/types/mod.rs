//! Core types used across the L402 Kit.

mod amount;
mod credential;
mod payment;

pub use amount::*;
pub use credential::*;
pub use payment::*;
