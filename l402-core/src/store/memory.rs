//! In-memory storage backend
//!
//! Default storage implementation using in-memory hashmaps.
//! Suitable for development and single-instance deployments.
//! Data is lost on restart.

use std::collections::{HashMap, hash_map::Entry};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{CredentialRecord, CredentialStore, SettlementEntry, SettlementStore, StoreError};
use crate::types::{Credential, PaymentHash, Preimage};

/// In-memory credential and settlement store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    credentials: RwLock<HashMap<Credential, CredentialRecord>>,
    settlements: RwLock<HashMap<PaymentHash, SettlementEntry>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn insert(&self, credential: &Credential, record: CredentialRecord) -> Result<(), StoreError> {
        match self.credentials.write().entry(credential.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(format!("{credential:?}"))),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn get(&self, credential: &Credential) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.credentials.read().get(credential).cloned())
    }

    fn remove_issued_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<CredentialRecord>, StoreError> {
        let mut credentials = self.credentials.write();
        let mut removed = Vec::new();
        credentials.retain(|_, record| {
            if record.issued_at < cutoff {
                removed.push(record.clone());
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.credentials.read().len())
    }
}

impl SettlementStore for MemoryStore {
    fn insert_pending(&self, payment_hash: &PaymentHash) -> Result<(), StoreError> {
        match self.settlements.write().entry(*payment_hash) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(payment_hash.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(SettlementEntry::Pending);
                Ok(())
            }
        }
    }

    fn get(&self, payment_hash: &PaymentHash) -> Result<Option<SettlementEntry>, StoreError> {
        Ok(self.settlements.read().get(payment_hash).cloned())
    }

    fn record_preimage(&self, payment_hash: &PaymentHash, preimage: Preimage) -> Result<Preimage, StoreError> {
        let mut settlements = self.settlements.write();
        let Some(entry) = settlements.get_mut(payment_hash) else {
            return Ok(preimage);
        };

        if let SettlementEntry::Settled(existing) = entry {
            return Ok(existing.clone());
        }
        *entry = SettlementEntry::Settled(preimage.clone());
        Ok(preimage)
    }

    fn pending(&self) -> Result<Vec<PaymentHash>, StoreError> {
        Ok(self
            .settlements
            .read()
            .iter()
            .filter(|(_, entry)| matches!(entry, SettlementEntry::Pending))
            .map(|(hash, _)| *hash)
            .collect())
    }

    fn remove(&self, payment_hash: &PaymentHash) -> Result<bool, StoreError> {
        Ok(self.settlements.write().remove(payment_hash).is_some())
    }
}
