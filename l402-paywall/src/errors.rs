use http::{HeaderName, HeaderValue, StatusCode};
use l402_core::{
    errors::L402Error,
    transport::{Challenge, ChallengeHeaders},
};
use serde::Serialize;

/// Represents an error response from the paywall.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub body: ErrorBody,
}

/// JSON body of a paywall error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    /// Machine-readable error code, see [`L402Error::code`].
    pub code: &'static str,
    /// The challenge headers, repeated in the body for clients that cannot
    /// read response headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<ChallengeHeaders>,
}

impl ErrorResponse {
    /// `402 Payment Required` carrying a fresh challenge.
    pub fn payment_required(challenge: &Challenge) -> Self {
        ErrorResponse {
            status: StatusCode::PAYMENT_REQUIRED,
            body: ErrorBody {
                message: "Payment required".to_string(),
                code: L402Error::ChallengeRequired.code(),
                headers: Some(challenge.headers()),
            },
        }
    }

    /// Map an engine error to a response.
    ///
    /// [`L402Error::ChallengeRequired`] maps to a bare 402 here; use
    /// [`PayWall::error_response`](crate::paywall::PayWall::error_response)
    /// to attach a fresh challenge.
    pub fn from_error(err: &L402Error) -> Self {
        let (status, message) = match err {
            L402Error::ChallengeRequired => (StatusCode::PAYMENT_REQUIRED, "Payment required"),
            L402Error::InvalidScheme(_) => {
                (StatusCode::UNAUTHORIZED, "Invalid authorization scheme")
            }
            L402Error::AuthenticationFailed => (StatusCode::UNAUTHORIZED, "Invalid L402 credentials"),
            L402Error::BackendUnavailable { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Payment backend unavailable")
            }
            L402Error::BackendError { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Payment backend error")
            }
            L402Error::InvalidAmount(_) | L402Error::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        ErrorResponse {
            status,
            body: ErrorBody {
                message: message.to_string(),
                code: err.code(),
                headers: None,
            },
        }
    }

    /// Challenge headers to set on the response, if any.
    ///
    /// Values that are not valid header values are skipped.
    pub fn header_values(&self) -> Vec<(HeaderName, HeaderValue)> {
        let Some(headers) = &self.body.headers else {
            return Vec::new();
        };

        headers
            .pairs()
            .into_iter()
            .filter_map(|(name, value)| {
                HeaderValue::from_str(value)
                    .ok()
                    .map(|v| (HeaderName::from_static(name), v))
            })
            .collect()
    }
}

impl From<L402Error> for ErrorResponse {
    fn from(err: L402Error) -> Self {
        ErrorResponse::from_error(&err)
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        let headers = self.header_values();
        let mut response = (self.status, axum::extract::Json(self.body)).into_response();
        for (name, val) in headers {
            response.headers_mut().insert(name, val);
        }
        response
    }
}
