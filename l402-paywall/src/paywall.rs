//! HTTP Paywall using L402 payments.
//!
//! For details, see the [`PayWall`] struct documentation.

use bon::Builder;
use http::{HeaderMap, Request, Response};
use l402_core::{
    L402Engine,
    backend::PaymentBackend,
    errors::L402Error,
    transport::{AUTHORIZATION_HEADER, MACAROON_HEADER, PresentedCredentials},
    types::Amount,
};

use crate::{
    errors::ErrorResponse,
    processor::{PaymentState, RequestProcessor},
};

/// A HTTP paywall that gates a resource behind an L402 payment.
///
/// Requests without credentials are answered with a fresh challenge for
/// [`price`](PayWall::price); requests with credentials are checked by the
/// [`L402Engine`].
///
/// ## Step-by-Step API
///
/// [`handle_payment`](PayWall::handle_payment) runs the standard flow:
///
/// 1. **Process Request** ([`process_request`](PayWall::process_request)): Extracts the
///    `Authorization` and `L402-Macaroon` headers, creating a [`RequestProcessor`].
/// 2. **Verify** ([`RequestProcessor::verify`](crate::processor::RequestProcessor::verify)):
///    Verifies the credential and proof of payment with the engine.
/// 3. **Run Handler** ([`RequestProcessor::run_handler`](crate::processor::RequestProcessor::run_handler)):
///    Executes the resource handler, injecting [`PaymentState`] into request extensions.
///
/// Custom flows can call the steps directly. Skipping verification grants
/// access unconditionally.
#[derive(Builder, Debug)]
pub struct PayWall<B: PaymentBackend> {
    /// The engine issuing challenges and verifying credentials.
    pub engine: L402Engine<B>,
    /// Price of the protected resource.
    pub price: Amount,
}

impl<B: PaymentBackend> Clone for PayWall<B> {
    fn clone(&self) -> Self {
        PayWall {
            engine: self.engine.clone(),
            price: self.price,
        }
    }
}

impl<B: PaymentBackend> PayWall<B> {
    /// Entrypoint of an L402 payment flow.
    ///
    /// Extract the presented credentials from the request headers.
    /// Returns a [`RequestProcessor`] on success for further processing.
    pub async fn process_request<Req>(
        &self,
        request: Request<Req>,
    ) -> Result<RequestProcessor<'_, B, Req>, ErrorResponse> {
        let presented = match presented_credentials(request.headers()) {
            Ok(presented) => presented,
            Err(err) => return Err(self.error_response(err).await),
        };

        Ok(RequestProcessor {
            paywall: self,
            request,
            presented,
            payment_state: PaymentState {
                verified: None,
                price: self.price,
            },
        })
    }

    /// Standard payment handling flow.
    ///
    /// This handler will **extract** the credentials, **verify** them and
    /// **run** the provided resource handler.
    pub async fn handle_payment<Fun, Fut, Req, Res>(
        &self,
        request: Request<Req>,
        handler: Fun,
    ) -> Result<Response<Res>, ErrorResponse>
    where
        Fun: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Response<Res>>,
    {
        let response = self
            .process_request(request)
            .await?
            .verify()
            .await?
            .run_handler(handler)
            .await;

        Ok(response)
    }

    /// Issue a fresh challenge and wrap it in a `402 Payment Required` response.
    pub async fn challenge(&self) -> ErrorResponse {
        match self.engine.issue_challenge(self.price).await {
            Ok(challenge) => ErrorResponse::payment_required(&challenge),
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::error!(amount = self.price.sats(), "Failed to issue challenge: {err}");
                ErrorResponse::from_error(&err)
            }
        }
    }

    /// Turn an engine error into a response, issuing a fresh challenge when
    /// credentials are missing.
    pub async fn error_response(&self, err: L402Error) -> ErrorResponse {
        match err {
            L402Error::ChallengeRequired => self.challenge().await,
            err => {
                #[cfg(feature = "tracing")]
                tracing::debug!(code = err.code(), "Rejected L402 request: {err}");
                ErrorResponse::from_error(&err)
            }
        }
    }
}

/// Read the presented credentials from request headers.
///
/// Header values that are not visible ASCII count as invalid credentials.
pub fn presented_credentials(headers: &HeaderMap) -> Result<PresentedCredentials, L402Error> {
    PresentedCredentials::from_header_values(
        header_str(headers, AUTHORIZATION_HEADER)?,
        header_str(headers, MACAROON_HEADER)?,
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, L402Error> {
    headers
        .get(name)
        .map(|value| value.to_str().map_err(|_| L402Error::AuthenticationFailed))
        .transpose()
}
