use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use l402_core::backend::PaymentBackend;
use tower::{Layer, Service};

use crate::paywall::PayWall;

impl<B: PaymentBackend, S> Layer<S> for PayWall<B> {
    type Service = PayWallService<B, S>;

    fn layer(&self, inner: S) -> Self::Service {
        PayWallService {
            paywall: self.clone(),
            inner,
        }
    }
}

/// The [`Service`] produced by layering a [`PayWall`] over a route.
pub struct PayWallService<B: PaymentBackend, S> {
    paywall: PayWall<B>,
    inner: S,
}

impl<B: PaymentBackend, S: Clone> Clone for PayWallService<B, S> {
    fn clone(&self) -> Self {
        PayWallService {
            paywall: self.paywall.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<B, S> Service<Request> for PayWallService<B, S>
where
    B: PaymentBackend,
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // Keep the service that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let paywall = self.paywall.clone();

        Box::pin(async move {
            let response = paywall
                .handle_payment(request, |req| async move {
                    match inner.call(req).await {
                        Ok(response) => response,
                        Err(never) => match never {},
                    }
                })
                .await
                .unwrap_or_else(|err| err.into_response());

            Ok(response)
        })
    }
}
