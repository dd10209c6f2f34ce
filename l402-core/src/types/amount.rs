//! [`Amount`] represents the price of a resource in the L402 protocol.
//!
//! This module holds its type definition and implementations.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::errors::L402Error;

/// A strictly positive payment amount, in satoshis.
///
/// Construct it with [`TryFrom`]; zero and negative values are rejected with
/// [`L402Error::InvalidAmount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    /// The amount in satoshis.
    pub fn sats(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Amount {
    type Error = L402Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            return Err(L402Error::InvalidAmount(value.to_string()));
        }
        Ok(Amount(value))
    }
}

impl TryFrom<i64> for Amount {
    type Error = L402Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map_err(|_| L402Error::InvalidAmount(value.to_string()))
            .and_then(Amount::try_from)
    }
}

impl TryFrom<u32> for Amount {
    type Error = L402Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Amount::try_from(value as u64)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        Amount::try_from(value).map_err(serde::de::Error::custom)
    }
}
