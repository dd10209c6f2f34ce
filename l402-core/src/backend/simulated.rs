use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;

use crate::{
    backend::{BackendError, Invoice, PaymentBackend, Settlement},
    types::{Amount, PaymentHash, Preimage},
};

#[derive(Debug)]
struct SimulatedInvoice {
    amount: Amount,
    preimage: Preimage,
    settled: bool,
}

#[derive(Debug, Default)]
struct Inner {
    invoices: Mutex<HashMap<PaymentHash, SimulatedInvoice>>,
    unavailable: AtomicBool,
    reject_next: Mutex<Option<String>>,
    latency: Mutex<Option<Duration>>,
    settlement_lookups: AtomicUsize,
}

/// An in-process payment backend.
///
/// Invoices are backed by random preimages and hashed with SHA-256 the way a
/// Lightning node does it. Nothing settles on its own: call
/// [`settle`](SimulatedBackend::settle) to play the part of a paying client.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    inner: Arc<Inner>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an invoice as paid. Returns `false` for unknown invoices.
    pub fn settle(&self, payment_hash: &PaymentHash) -> bool {
        match self.inner.invoices.lock().get_mut(payment_hash) {
            Some(invoice) => {
                invoice.settled = true;
                true
            }
            None => false,
        }
    }

    /// The preimage a paying client would learn once the invoice settles.
    pub fn preimage_of(&self, payment_hash: &PaymentHash) -> Option<Preimage> {
        self.inner
            .invoices
            .lock()
            .get(payment_hash)
            .filter(|invoice| invoice.settled)
            .map(|invoice| invoice.preimage.clone())
    }

    /// The amount an invoice was created for.
    pub fn amount_of(&self, payment_hash: &PaymentHash) -> Option<Amount> {
        self.inner
            .invoices
            .lock()
            .get(payment_hash)
            .map(|invoice| invoice.amount)
    }

    /// Simulate a node that cannot be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next `create_invoice` call fail with [`BackendError::Rejected`].
    pub fn reject_next_invoice(&self, reason: impl Into<String>) {
        *self.inner.reject_next.lock() = Some(reason.into());
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.lock() = latency;
    }

    /// Number of `get_settlement` calls served so far.
    pub fn settlement_lookups(&self) -> usize {
        self.inner.settlement_lookups.load(Ordering::SeqCst)
    }

    pub fn invoice_count(&self) -> usize {
        self.inner.invoices.lock().len()
    }

    async fn simulate_network(&self) -> Result<(), BackendError> {
        let latency = *self.inner.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable(
                "simulated node is unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

impl PaymentBackend for SimulatedBackend {
    async fn create_invoice(&self, amount: Amount) -> Result<Invoice, BackendError> {
        self.simulate_network().await?;

        if let Some(reason) = self.inner.reject_next.lock().take() {
            return Err(BackendError::Rejected(reason));
        }

        let preimage = Preimage::generate();
        let payment_hash = PaymentHash::of_preimage(&preimage);
        let payment_request = format!("lnsim{}1{}", amount, &payment_hash.to_hex()[..16]);

        self.inner.invoices.lock().insert(
            payment_hash,
            SimulatedInvoice {
                amount,
                preimage,
                settled: false,
            },
        );

        Ok(Invoice {
            payment_hash,
            payment_request,
        })
    }

    async fn get_settlement(&self, payment_hash: &PaymentHash) -> Result<Settlement, BackendError> {
        self.inner.settlement_lookups.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;

        let invoices = self.inner.invoices.lock();
        let invoice = invoices
            .get(payment_hash)
            .ok_or_else(|| BackendError::Rejected(format!("unknown invoice {payment_hash}")))?;

        if invoice.settled {
            Ok(Settlement::settled(invoice.preimage.clone()))
        } else {
            Ok(Settlement::pending())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invoice_settles_on_demand() {
        let backend = SimulatedBackend::new();
        let invoice = backend
            .create_invoice(Amount::try_from(1000u64).unwrap())
            .await
            .unwrap();

        assert!(invoice.payment_request.starts_with("lnsim1000"));
        assert!(!backend.get_settlement(&invoice.payment_hash).await.unwrap().settled);
        assert!(backend.preimage_of(&invoice.payment_hash).is_none());

        assert!(backend.settle(&invoice.payment_hash));
        let settlement = backend.get_settlement(&invoice.payment_hash).await.unwrap();
        assert!(settlement.settled);

        let preimage = settlement.preimage.unwrap();
        assert_eq!(PaymentHash::of_preimage(&preimage), invoice.payment_hash);
        assert_eq!(backend.settlement_lookups(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_and_rejected() {
        let backend = SimulatedBackend::new();
        let amount = Amount::try_from(1u64).unwrap();

        backend.reject_next_invoice("amount below minimum");
        assert!(matches!(
            backend.create_invoice(amount).await,
            Err(BackendError::Rejected(_))
        ));
        assert!(backend.create_invoice(amount).await.is_ok());

        backend.set_unavailable(true);
        assert!(matches!(
            backend.create_invoice(amount).await,
            Err(BackendError::Unavailable(_))
        ));
    }
}
