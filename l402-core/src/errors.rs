use crate::{
    backend::{BackendError, BackendOperation},
    store::StoreError,
};

/// Error types for parsing L402 values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Hex decoding errors.
    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// A fixed-size value had the wrong number of bytes.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// A specialized `Result` type for L402 parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The L402 protocol error taxonomy.
///
/// Every failure of the challenge issuer or the credential verifier is one of
/// these. None of them are retried by the engine.
#[derive(Debug, thiserror::Error)]
pub enum L402Error {
    /// The request carried no L402 credentials; answer with a fresh challenge.
    #[error("L402 credentials are required")]
    ChallengeRequired,

    /// The `Authorization` header used a scheme other than `L402`.
    #[error("Invalid authorization scheme: {0}")]
    InvalidScheme(String),

    /// Unknown, expired or unpaid credential, or a proof that does not match.
    #[error("Invalid L402 credentials")]
    AuthenticationFailed,

    /// The payment backend could not be reached or did not answer in time.
    #[error("Payment backend unavailable during {operation}: {reason}")]
    BackendUnavailable {
        operation: BackendOperation,
        reason: String,
    },

    /// The payment backend answered with a failure.
    #[error("Payment backend error during {operation}: {reason}")]
    BackendError {
        operation: BackendOperation,
        reason: String,
    },

    /// A price that is zero or negative.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl L402Error {
    /// Classify a backend failure for the given operation.
    ///
    /// Transport failures stay distinct from everything else so an outage is
    /// never mistaken for a denied payment.
    pub fn from_backend(operation: BackendOperation, err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(reason) => L402Error::BackendUnavailable { operation, reason },
            BackendError::Rejected(reason) | BackendError::InvalidResponse(reason) => {
                L402Error::BackendError { operation, reason }
            }
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            L402Error::ChallengeRequired => "challenge_required",
            L402Error::InvalidScheme(_) => "invalid_scheme",
            L402Error::AuthenticationFailed => "authentication_failed",
            L402Error::BackendUnavailable { .. } => "backend_unavailable",
            L402Error::BackendError { .. } => "backend_error",
            L402Error::InvalidAmount(_) => "invalid_amount",
            L402Error::InternalError(_) => "internal_error",
        }
    }
}

impl From<StoreError> for L402Error {
    fn from(err: StoreError) -> Self {
        L402Error::InternalError(format!("Store error: {err}"))
    }
}

/// Lets [`Amount`](crate::types::Amount) itself be passed where a
/// convertible price is expected.
impl From<std::convert::Infallible> for L402Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}
