//! Payment identifiers and proofs of payment.

use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::Error;

/// Length in bytes of a payment hash and of a preimage.
pub const HASH_LEN: usize = 32;

/// The payment backend's handle for a specific invoice.
///
/// For Lightning invoices this is the SHA-256 hash of the payment preimage.
/// Rendered as lowercase hex everywhere it crosses a process boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaymentHash(pub [u8; HASH_LEN]);

impl PaymentHash {
    /// Parse a payment hash from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let array: [u8; HASH_LEN] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: HASH_LEN,
            actual: bytes.len(),
        })?;
        Ok(PaymentHash(array))
    }

    /// The hash that commits to the given preimage.
    pub fn of_preimage(preimage: &Preimage) -> Self {
        PaymentHash(Sha256::digest(preimage.0).into())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for PaymentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for PaymentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentHash({})", self.to_hex())
    }
}

impl FromStr for PaymentHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentHash::from_slice(&hex::decode(s)?)
    }
}

impl Serialize for PaymentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PaymentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Proof of payment: the secret revealed by the payment backend once an
/// invoice settles.
///
/// Its `Debug` output is redacted and it has no `Display`, so it cannot end
/// up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct Preimage(pub [u8; HASH_LEN]);

impl Preimage {
    /// Generate a fresh random preimage.
    pub fn generate() -> Self {
        let mut bytes = [0u8; HASH_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Preimage(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let array: [u8; HASH_LEN] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: HASH_LEN,
            actual: bytes.len(),
        })?;
        Ok(Preimage(array))
    }

    /// Parse a hex-encoded preimage, as presented in an `Authorization` header.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        Preimage::from_slice(&hex::decode(s)?)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Compare against presented proof bytes in constant time.
    ///
    /// Slices of the wrong length never match.
    pub fn matches(&self, presented: &[u8]) -> bool {
        self.0.as_slice().ct_eq(presented).into()
    }
}

impl Debug for Preimage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Preimage(<redacted>)")
    }
}
