//! A [`PaymentBackend`] backed by an LND node's REST API.
//!
//! Invoices are created with `POST /v1/invoices` and looked up with
//! `GET /v1/invoice/{r_hash}`; every request carries the node's macaroon in the
//! `Grpc-Metadata-Macaroon` header.

use std::time::Duration;

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE},
};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use crate::{
    backend::{BackendError, Invoice, PaymentBackend, Settlement},
    types::{Amount, PaymentHash, Preimage},
};

/// Default port of LND's REST listener.
pub const DEFAULT_REST_PORT: u16 = 8080;

const MACAROON_HEADER: HeaderName = HeaderName::from_static("grpc-metadata-macaroon");

/// A client for the subset of LND's REST API an L402 server needs.
#[derive(Debug, Clone)]
pub struct LndClient {
    pub base_url: Url,
    pub client: reqwest::Client,
    macaroon: HeaderValue,
}

#[bon::bon]
impl LndClient {
    /// Build a client.
    ///
    /// `host` is either a bare host (`node.example.com`, REST port 8080 is
    /// assumed), a `host:port` pair, or a full base URL.
    #[builder]
    pub fn new(
        #[builder(into)] host: String,
        // Hex-encoded macaroon.
        #[builder(into)]
        macaroon: String,
        // LND serves a self-signed certificate by default.
        #[builder(default)]
        accept_invalid_certs: bool,
        timeout: Option<Duration>,
    ) -> Result<Self, LndClientError> {
        let base_url = base_url(&host)?;

        let mut macaroon =
            HeaderValue::from_str(macaroon.trim()).map_err(|_| LndClientError::InvalidMacaroon)?;
        macaroon.set_sensitive(true);

        let mut client = reqwest::Client::builder().danger_accept_invalid_certs(accept_invalid_certs);
        if let Some(timeout) = timeout {
            client = client.timeout(timeout);
        }

        Ok(LndClient {
            base_url,
            client: client.build()?,
            macaroon,
        })
    }
}

impl LndClient {
    /// `GET /v1/getinfo`, used as a connectivity check.
    pub async fn get_info(&self) -> Result<NodeInfo, LndClientError> {
        self.get("v1/getinfo").await
    }

    /// `POST /v1/invoices`.
    pub async fn add_invoice(&self, amount: Amount) -> Result<Invoice, LndClientError> {
        let response = self
            .client
            .post(self.base_url.join("v1/invoices")?)
            .header(MACAROON_HEADER, self.macaroon.clone())
            .json(&AddInvoiceRequest {
                value: amount.sats(),
            })
            .send()
            .await?;

        let added: AddInvoiceResponse = parse_response(response).await?;
        added.try_into()
    }

    /// `GET /v1/invoice/{r_hash}`.
    pub async fn lookup_invoice(&self, payment_hash: &PaymentHash) -> Result<Settlement, LndClientError> {
        let invoice: LookupInvoiceResponse = self
            .get(&format!("v1/invoice/{}", payment_hash.to_hex()))
            .await?;
        invoice.try_into()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, LndClientError> {
        let response = self
            .client
            .get(self.base_url.join(path)?)
            .header(MACAROON_HEADER, self.macaroon.clone())
            .send()
            .await?;

        parse_response(response).await
    }
}

impl PaymentBackend for LndClient {
    async fn create_invoice(&self, amount: Amount) -> Result<Invoice, BackendError> {
        Ok(self.add_invoice(amount).await?)
    }

    async fn get_settlement(&self, payment_hash: &PaymentHash) -> Result<Settlement, BackendError> {
        Ok(self.lookup_invoice(payment_hash).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LndClientError {
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("HTTP request error: {0}")]
    HttpRequestError(#[from] reqwest::Error),
    #[error("Macaroon is not a valid header value")]
    InvalidMacaroon,
    #[error("LND responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid LND response: {0}")]
    InvalidResponse(String),
}

impl From<LndClientError> for BackendError {
    fn from(err: LndClientError) -> Self {
        match err {
            LndClientError::HttpRequestError(err) if err.is_decode() => {
                BackendError::InvalidResponse(err.to_string())
            }
            LndClientError::HttpRequestError(err) => BackendError::Unavailable(err.to_string()),
            LndClientError::InvalidResponse(reason) => BackendError::InvalidResponse(reason),
            // A gateway in front of the node answering for it.
            err @ LndClientError::Status {
                status: 502 | 503 | 504,
                ..
            } => BackendError::Unavailable(err.to_string()),
            err @ (LndClientError::Status { .. }
            | LndClientError::UrlParseError(_)
            | LndClientError::InvalidMacaroon) => BackendError::Rejected(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct AddInvoiceRequest {
    value: u64,
}

/// Response of `POST /v1/invoices`. Byte fields are base64.
#[derive(Debug, Clone, Deserialize)]
pub struct AddInvoiceResponse {
    pub r_hash: String,
    pub payment_request: String,
    #[serde(default)]
    pub add_index: Option<String>,
}

impl TryFrom<AddInvoiceResponse> for Invoice {
    type Error = LndClientError;

    fn try_from(response: AddInvoiceResponse) -> Result<Self, Self::Error> {
        let r_hash = decode_base64("r_hash", &response.r_hash)?;
        let payment_hash = PaymentHash::from_slice(&r_hash)
            .map_err(|err| LndClientError::InvalidResponse(format!("r_hash: {err}")))?;

        if response.payment_request.is_empty() {
            return Err(LndClientError::InvalidResponse(
                "empty payment_request".to_string(),
            ));
        }

        Ok(Invoice {
            payment_hash,
            payment_request: response.payment_request,
        })
    }
}

/// Response of `GET /v1/invoice/{r_hash}`, reduced to the settlement fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupInvoiceResponse {
    /// Deprecated by LND in favour of `state`, still populated.
    #[serde(default)]
    pub settled: bool,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub r_preimage: Option<String>,
}

impl LookupInvoiceResponse {
    pub fn is_settled(&self) -> bool {
        self.settled || self.state.as_deref() == Some("SETTLED")
    }
}

impl TryFrom<LookupInvoiceResponse> for Settlement {
    type Error = LndClientError;

    fn try_from(response: LookupInvoiceResponse) -> Result<Self, Self::Error> {
        if !response.is_settled() {
            return Ok(Settlement::pending());
        }

        let r_preimage = response
            .r_preimage
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                LndClientError::InvalidResponse("settled invoice without r_preimage".to_string())
            })?;

        let preimage = Preimage::from_slice(&decode_base64("r_preimage", r_preimage)?)
            .map_err(|err| LndClientError::InvalidResponse(format!("r_preimage: {err}")))?;

        Ok(Settlement::settled(preimage))
    }
}

/// Response of `GET /v1/getinfo`, reduced to what is worth logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeInfo {
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub identity_pubkey: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub block_height: u32,
    #[serde(default)]
    pub synced_to_chain: bool,
}

fn base_url(host: &str) -> Result<Url, LndClientError> {
    let host = host.trim().trim_end_matches('/');
    let url = if host.contains("://") {
        format!("{host}/")
    } else if host.contains(':') {
        format!("https://{host}/")
    } else {
        format!("https://{host}:{DEFAULT_REST_PORT}/")
    };

    Ok(Url::parse(&url)?)
}

fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>, LndClientError> {
    STANDARD
        .decode(value)
        .or_else(|_| URL_SAFE.decode(value))
        .map_err(|err| LndClientError::InvalidResponse(format!("{field}: {err}")))
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LndClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LndClientError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| LndClientError::InvalidResponse(err.to_string()))
}
