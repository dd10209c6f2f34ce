//! Storage abstraction for L402 protocol state.
//!
//! The engine keeps two mappings: credential → payment hash, and payment
//! hash → proof of payment. Both sit behind traits so the engine can be
//! tested in isolation and pointed at a persistent backend. [`MemoryStore`]
//! implements both and is the default; its contents are lost on restart.

pub mod memory;

pub use memory::MemoryStore;

use std::fmt::Debug;

use chrono::{DateTime, Utc};

use crate::types::{Credential, PaymentHash, Preimage};

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// What the credential store knows about an issued credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    /// The payment hash this credential is bound to. Never changes.
    pub payment_hash: PaymentHash,
    pub issued_at: DateTime<Utc>,
}

/// Settlement state cached for a payment hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementEntry {
    /// Invoice issued, no proof of payment observed yet.
    Pending,
    /// Proof of payment recorded. Immutable.
    Settled(Preimage),
}

impl SettlementEntry {
    pub fn preimage(&self) -> Option<&Preimage> {
        match self {
            SettlementEntry::Pending => None,
            SettlementEntry::Settled(preimage) => Some(preimage),
        }
    }
}

/// Credential → payment hash mapping.
///
/// Implementations must be thread-safe; every call is a short critical
/// section.
pub trait CredentialStore: Send + Sync + Debug {
    /// Bind a new credential. Fails with [`StoreError::AlreadyExists`] if
    /// the credential is already bound.
    fn insert(&self, credential: &Credential, record: CredentialRecord) -> Result<(), StoreError>;

    fn get(&self, credential: &Credential) -> Result<Option<CredentialRecord>, StoreError>;

    /// Remove every credential issued before `cutoff`, returning the removed records.
    fn remove_issued_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<CredentialRecord>, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;
}

/// Payment hash → proof of payment mapping.
///
/// A recorded preimage is never overwritten: the first write wins and every
/// later writer observes it.
pub trait SettlementStore: Send + Sync + Debug {
    /// Record a pending entry for a freshly issued invoice. Fails with
    /// [`StoreError::AlreadyExists`] if the hash is already known.
    fn insert_pending(&self, payment_hash: &PaymentHash) -> Result<(), StoreError>;

    fn get(&self, payment_hash: &PaymentHash) -> Result<Option<SettlementEntry>, StoreError>;

    /// Record the preimage for a payment hash unless one is already stored.
    ///
    /// Returns the preimage that is stored after the call, which is the
    /// earlier one if this write lost the race. Hashes that are not tracked
    /// (never issued or already removed) are left untracked.
    fn record_preimage(&self, payment_hash: &PaymentHash, preimage: Preimage) -> Result<Preimage, StoreError>;

    /// Payment hashes that are still waiting for settlement.
    fn pending(&self) -> Result<Vec<PaymentHash>, StoreError>;

    fn remove(&self, payment_hash: &PaymentHash) -> Result<bool, StoreError>;
}
