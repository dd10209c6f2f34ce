//! The payment backend contract.
//!
//! The engine only ever talks to a Lightning node through [`PaymentBackend`].
//! No transport or encoding is assumed: the LND REST client in `l402-kit` and
//! the in-process [`SimulatedBackend`] are both plain implementations.

mod simulated;

pub use simulated::SimulatedBackend;

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::types::{Amount, PaymentHash, Preimage};

/// A freshly created invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// The backend's identifier for the invoice.
    pub payment_hash: PaymentHash,
    /// The payable invoice string (BOLT11 payment request for Lightning).
    pub payment_request: String,
}

/// Settlement status of an invoice as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settlement {
    pub settled: bool,
    /// Present once the invoice is settled.
    pub preimage: Option<Preimage>,
}

impl Settlement {
    pub fn pending() -> Self {
        Settlement::default()
    }

    pub fn settled(preimage: Preimage) -> Self {
        Settlement {
            settled: true,
            preimage: Some(preimage),
        }
    }
}

/// Backend operations, used to label failures and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOperation {
    CreateInvoice,
    GetSettlement,
}

impl Display for BackendOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendOperation::CreateInvoice => f.write_str("create_invoice"),
            BackendOperation::GetSettlement => f.write_str("get_settlement"),
        }
    }
}

/// Failures reported by a [`PaymentBackend`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or timed out.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but refused the operation.
    #[error("Backend rejected request: {0}")]
    Rejected(String),

    /// The backend answered with something that could not be understood.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

/// L402 payment backend interface.
pub trait PaymentBackend: Send + Sync + 'static {
    /// Create an invoice for the given amount.
    fn create_invoice(
        &self,
        amount: Amount,
    ) -> impl Future<Output = Result<Invoice, BackendError>> + Send;

    /// Report whether the invoice identified by `payment_hash` is settled.
    fn get_settlement(
        &self,
        payment_hash: &PaymentHash,
    ) -> impl Future<Output = Result<Settlement, BackendError>> + Send;
}
