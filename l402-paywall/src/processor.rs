use http::{Request, Response};
use l402_core::{
    VerifiedPayment, backend::PaymentBackend, transport::PresentedCredentials, types::Amount,
};

use crate::{errors::ErrorResponse, paywall::PayWall};

/// The state of a payment processed by the paywall when accessing the resource handler.
///
/// This state is attached to the request extensions before running the resource handler,
/// and can be accessed within the handler to inspect the payment.
///
/// # Example
///
/// ```rust
/// use axum::{extract::Extension, Json};
/// use serde_json::{json, Value};
/// use l402_paywall::processor::PaymentState;
///
/// async fn example_handler(Extension(payment_state): Extension<PaymentState>) -> Json<Value> {
///     Json(json!({
///         "message": "You have accessed a protected resource!",
///         "payment": serde_json::to_value(&payment_state.verified).unwrap_or(json!(null)),
///     }))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PaymentState {
    /// Verification result, if verification was performed.
    pub verified: Option<VerifiedPayment>,
    /// Price of the resource.
    pub price: Amount,
}

/// Payment processing state before running the resource handler.
///
/// See [`PayWall`] for usage in the full payment processing flow.
pub struct RequestProcessor<'pw, B: PaymentBackend, Req> {
    pub paywall: &'pw PayWall<B>,
    pub request: Request<Req>,
    pub presented: PresentedCredentials,
    pub payment_state: PaymentState,
}

impl<'pw, B: PaymentBackend, Req> RequestProcessor<'pw, B, Req> {
    /// Verify the presented credential and proof of payment.
    ///
    /// `self.payment_state.verified` will be populated on success.
    pub async fn verify(mut self) -> Result<Self, ErrorResponse> {
        let verified = self
            .paywall
            .engine
            .verify(&self.presented.proof, &self.presented.credential)
            .await;

        let verified = match verified {
            Ok(verified) => verified,
            Err(err) => return Err(self.paywall.error_response(err).await),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(payment_hash = %verified.payment_hash, "Payment verified");

        self.payment_state.verified = Some(verified);

        Ok(self)
    }

    /// Run the resource handler with the payment state attached to the request extensions.
    pub async fn run_handler<Fun, Fut, Res>(mut self, handler: Fun) -> Response<Res>
    where
        Fun: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Response<Res>>,
    {
        self.request
            .extensions_mut()
            .insert(self.payment_state.clone());

        handler(self.request).await
    }
}
