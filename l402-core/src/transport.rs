//! Wire representation of L402 challenges and presented credentials.
//!
//! A challenge travels in three response headers:
//!
//! ```text
//! WWW-Authenticate: L402 token="<payment hash>"
//! L402-Invoice: <payable invoice>
//! L402-Macaroon: <credential>
//! ```
//!
//! and a client proves payment with two request headers:
//!
//! ```text
//! Authorization: L402 <hex preimage>
//! L402-Macaroon: <credential>
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    errors::L402Error,
    types::{Amount, Credential, PaymentHash},
};

/// The authentication scheme token.
pub const L402_SCHEME: &str = "L402";

pub const WWW_AUTHENTICATE_HEADER: &str = "www-authenticate";
pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const INVOICE_HEADER: &str = "l402-invoice";
pub const MACAROON_HEADER: &str = "l402-macaroon";

/// A payment challenge: an invoice plus the credential bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub payment_hash: PaymentHash,
    /// Payable invoice string.
    pub invoice: String,
    pub credential: Credential,
    pub amount: Amount,
    pub issued_at: DateTime<Utc>,
    /// When the credential stops being accepted, if the engine has a TTL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Challenge {
    /// Value of the `WWW-Authenticate` header.
    pub fn www_authenticate(&self) -> String {
        format!("{L402_SCHEME} token=\"{}\"", self.payment_hash)
    }

    pub fn headers(&self) -> ChallengeHeaders {
        ChallengeHeaders {
            www_authenticate: self.www_authenticate(),
            invoice: self.invoice.clone(),
            macaroon: self.credential.to_string(),
        }
    }
}

/// The three challenge header values, serializable under their header names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeHeaders {
    #[serde(rename = "WWW-Authenticate")]
    pub www_authenticate: String,
    #[serde(rename = "L402-Invoice")]
    pub invoice: String,
    #[serde(rename = "L402-Macaroon")]
    pub macaroon: String,
}

impl ChallengeHeaders {
    /// `(lowercase header name, value)` pairs.
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            (WWW_AUTHENTICATE_HEADER, &self.www_authenticate),
            (INVOICE_HEADER, &self.invoice),
            (MACAROON_HEADER, &self.macaroon),
        ]
    }
}

/// Credentials presented on a protected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedCredentials {
    pub credential: Credential,
    /// Hex-encoded proof of payment exactly as presented. May be empty.
    pub proof: String,
}

impl PresentedCredentials {
    /// Parse the raw `Authorization` and `L402-Macaroon` header values.
    ///
    /// A missing header (or an empty credential) is
    /// [`L402Error::ChallengeRequired`]; a scheme other than `L402` is
    /// [`L402Error::InvalidScheme`]. The scheme is matched case-insensitively.
    pub fn from_header_values(
        authorization: Option<&str>,
        macaroon: Option<&str>,
    ) -> Result<Self, L402Error> {
        let (Some(authorization), Some(macaroon)) = (authorization, macaroon) else {
            return Err(L402Error::ChallengeRequired);
        };

        let macaroon = macaroon.trim();
        if macaroon.is_empty() {
            return Err(L402Error::ChallengeRequired);
        }

        let authorization = authorization.trim();
        let (scheme, proof) = authorization
            .split_once(char::is_whitespace)
            .unwrap_or((authorization, ""));

        if !scheme.eq_ignore_ascii_case(L402_SCHEME) {
            return Err(L402Error::InvalidScheme(scheme.to_string()));
        }

        Ok(PresentedCredentials {
            credential: Credential::from(macaroon),
            proof: proof.trim().to_string(),
        })
    }
}
