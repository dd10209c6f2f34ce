//! [`Credential`] is the opaque token handed out with every challenge.

use std::fmt::{Debug, Display};

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Bytes of CSPRNG output behind every credential.
pub const CREDENTIAL_ENTROPY_BYTES: usize = 32;

/// An opaque, unguessable access-attempt token.
///
/// Sent to clients in the `L402-Macaroon` header. It carries no caveats; its
/// only meaning is the payment hash it is bound to in the credential store.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Mint a fresh credential with 256 bits of randomness.
    pub fn generate() -> Self {
        let mut bytes = [0u8; CREDENTIAL_ENTROPY_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Credential(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Credential(value)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Credential(value.to_string())
    }
}

impl Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Only a short prefix is shown so credentials are not replayable from debug logs.
impl Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "Credential({prefix}..)")
    }
}
