//! The L402 challenge and verification engine.
//!
//! [`L402Engine`] owns the credential and settlement stores and is the only
//! component that mutates them. It exposes the two protocol operations:
//!
//! - [`issue_challenge`](L402Engine::issue_challenge): create an invoice, mint
//!   a credential bound to it and return both as a [`Challenge`].
//! - [`verify`](L402Engine::verify): resolve a presented credential to its
//!   payment hash, make sure the invoice is settled and compare the presented
//!   proof of payment against the stored one.
//!
//! Plus settlement maintenance: [`poll_pending`](L402Engine::poll_pending),
//! [`purge_expired`](L402Engine::purge_expired) and
//! [`spawn_maintenance`](L402Engine::spawn_maintenance).

use std::{sync::Arc, time::Duration};

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
    backend::{BackendError, BackendOperation, PaymentBackend},
    errors::L402Error,
    store::{CredentialRecord, CredentialStore, MemoryStore, SettlementEntry, SettlementStore, StoreError},
    transport::Challenge,
    types::{Amount, Credential, PaymentHash, Preimage},
};

/// Engine configuration.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on every payment backend call. Expiry counts as
    /// [`L402Error::BackendUnavailable`].
    pub backend_timeout: Duration,
    /// How long an issued credential is accepted. `None` keeps credentials
    /// valid until the process restarts.
    pub credential_ttl: Option<Duration>,
}

impl EngineConfig {
    /// Check that the credential TTL can be applied to the current time.
    pub fn validate(&self) -> Result<(), L402Error> {
        self.expiry_of(Utc::now()).map(|_| ())
    }

    /// When a credential issued at `issued_at` stops being accepted.
    ///
    /// # Errors
    ///
    /// [`L402Error::InternalError`] if the TTL does not fit a timestamp.
    pub fn expiry_of(&self, issued_at: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, L402Error> {
        let Some(ttl) = self.ttl()? else {
            return Ok(None);
        };

        issued_at
            .checked_add_signed(ttl)
            .map(Some)
            .ok_or_else(|| ttl_out_of_range(ttl))
    }

    fn ttl(&self) -> Result<Option<chrono::Duration>, L402Error> {
        self.credential_ttl
            .map(|ttl| {
                chrono::Duration::from_std(ttl).map_err(|_| {
                    L402Error::InternalError(format!("Credential TTL {ttl:?} is out of range"))
                })
            })
            .transpose()
    }
}

fn ttl_out_of_range(ttl: chrono::Duration) -> L402Error {
    L402Error::InternalError(format!(
        "Credential TTL of {}s is out of range",
        ttl.num_seconds()
    ))
}

/// The outcome of a successful verification.
///
/// Attached to request extensions by the paywall so resource handlers can
/// see which payment unlocked them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPayment {
    pub payment_hash: PaymentHash,
    pub credential: Credential,
    pub issued_at: DateTime<Utc>,
}

/// L402 challenge issuer and credential verifier.
///
/// Cloning is cheap; clones share the backend and both stores.
#[derive(Debug)]
pub struct L402Engine<B: PaymentBackend> {
    backend: Arc<B>,
    credentials: Arc<dyn CredentialStore>,
    settlements: Arc<dyn SettlementStore>,
    config: EngineConfig,
}

impl<B: PaymentBackend> Clone for L402Engine<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            credentials: Arc::clone(&self.credentials),
            settlements: Arc::clone(&self.settlements),
            config: self.config.clone(),
        }
    }
}

#[bon::bon]
impl<B: PaymentBackend> L402Engine<B> {
    /// Build an engine. Stores that are not provided default to a shared
    /// [`MemoryStore`].
    #[builder]
    pub fn new(
        backend: B,
        config: EngineConfig,
        credentials: Option<Arc<dyn CredentialStore>>,
        settlements: Option<Arc<dyn SettlementStore>>,
    ) -> Self {
        let memory = Arc::new(MemoryStore::new());
        let credentials: Arc<dyn CredentialStore> = match credentials {
            Some(store) => store,
            None => memory.clone(),
        };
        let settlements: Arc<dyn SettlementStore> = match settlements {
            Some(store) => store,
            None => memory,
        };

        Self {
            backend: Arc::new(backend),
            credentials,
            settlements,
            config,
        }
    }
}

impl<B: PaymentBackend> L402Engine<B> {
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn settlements(&self) -> &Arc<dyn SettlementStore> {
        &self.settlements
    }

    /// Issue a payment challenge for a resource costing `amount` satoshis.
    ///
    /// Every call creates a new invoice and a new credential; there is no
    /// deduplication.
    pub async fn issue_challenge<A>(&self, amount: A) -> Result<Challenge, L402Error>
    where
        A: TryInto<Amount>,
        L402Error: From<A::Error>,
    {
        let amount: Amount = amount.try_into()?;
        let issued_at = Utc::now();
        let expires_at = self.config.expiry_of(issued_at)?;

        let invoice = call_backend(
            self.config.backend_timeout,
            BackendOperation::CreateInvoice,
            self.backend.create_invoice(amount),
        )
        .await
        .inspect_err(|err| {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                operation = %BackendOperation::CreateInvoice,
                amount = amount.sats(),
                "Failed to create invoice: {err}"
            );
        })?;

        let payment_hash = invoice.payment_hash;

        // One payment hash, one credential.
        self.settlements
            .insert_pending(&payment_hash)
            .map_err(|err| match err {
                StoreError::AlreadyExists(_) => L402Error::InternalError(format!(
                    "Payment hash {payment_hash} is already bound to a credential"
                )),
                other => other.into(),
            })?;

        let credential = Credential::generate();
        let record = CredentialRecord {
            payment_hash,
            issued_at,
        };
        if let Err(err) = self.credentials.insert(&credential, record) {
            // Do not leave a pending entry behind that no credential can reach.
            self.settlements.remove(&payment_hash).ok();
            return Err(err.into());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            payment_hash = %payment_hash,
            amount = amount.sats(),
            "Issued L402 challenge"
        );

        Ok(Challenge {
            payment_hash,
            invoice: invoice.payment_request,
            credential,
            amount,
            issued_at,
            expires_at,
        })
    }

    /// Verify a presented credential and proof of payment.
    ///
    /// `proof` is the hex-encoded preimage from the `Authorization` header.
    /// Unknown, expired and unpaid credentials as well as wrong proofs all
    /// fail with [`L402Error::AuthenticationFailed`]; a backend that cannot be
    /// reached fails with [`L402Error::BackendUnavailable`] instead.
    ///
    /// Verification does not consume anything: the same correct pair keeps
    /// verifying.
    pub async fn verify(&self, proof: &str, credential: &Credential) -> Result<VerifiedPayment, L402Error> {
        if credential.is_empty() {
            return Err(L402Error::ChallengeRequired);
        }

        let Some(record) = self.credentials.get(credential)? else {
            #[cfg(feature = "tracing")]
            tracing::debug!("Rejected unknown credential");
            return Err(L402Error::AuthenticationFailed);
        };

        let payment_hash = record.payment_hash;

        if self.is_expired(&record, Utc::now())? {
            #[cfg(feature = "tracing")]
            tracing::debug!(payment_hash = %payment_hash, "Rejected expired credential");
            return Err(L402Error::AuthenticationFailed);
        }

        let preimage = match self.settlements.get(&payment_hash)? {
            Some(SettlementEntry::Settled(preimage)) => preimage,
            Some(SettlementEntry::Pending) | None => {
                self.refresh_settlement(payment_hash).await?.ok_or_else(|| {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(payment_hash = %payment_hash, "Invoice not settled yet");
                    L402Error::AuthenticationFailed
                })?
            }
        };

        // Undecodable proofs decode to nothing and never match.
        let presented = hex::decode(proof).unwrap_or_default();
        if !preimage.matches(&presented) {
            #[cfg(feature = "tracing")]
            tracing::debug!(payment_hash = %payment_hash, "Proof of payment mismatch");
            return Err(L402Error::AuthenticationFailed);
        }

        Ok(VerifiedPayment {
            payment_hash,
            credential: credential.clone(),
            issued_at: record.issued_at,
        })
    }

    /// Query the backend for every pending invoice and cache the proofs of
    /// the ones that settled. Returns how many settled.
    ///
    /// Backend failures are logged and skipped.
    pub async fn poll_pending(&self) -> Result<usize, L402Error> {
        let pending = self.settlements.pending()?;
        let mut settled = 0;

        for payment_hash in pending {
            let lookup = lookup_settlement(
                Arc::clone(&self.backend),
                Arc::clone(&self.settlements),
                payment_hash,
                self.config.backend_timeout,
            )
            .await;

            if let Ok(Some(_)) = lookup {
                settled += 1;
            }
        }

        Ok(settled)
    }

    /// Drop credentials older than the TTL together with their settlement
    /// entries. Returns how many credentials were removed.
    pub fn purge_expired(&self) -> Result<usize, L402Error> {
        let Some(ttl) = self.config.ttl()? else {
            return Ok(0);
        };

        let cutoff = Utc::now()
            .checked_sub_signed(ttl)
            .ok_or_else(|| ttl_out_of_range(ttl))?;
        let removed = self.credentials.remove_issued_before(cutoff)?;
        for record in &removed {
            self.settlements.remove(&record.payment_hash)?;
        }

        Ok(removed.len())
    }

    /// Run [`purge_expired`](Self::purge_expired) and
    /// [`poll_pending`](Self::poll_pending) every `interval` on a background task.
    pub fn spawn_maintenance(&self, interval: Duration) -> JoinHandle<()> {
        let engine = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match engine.purge_expired() {
                    Ok(0) => {}
                    Ok(_purged) => {
                        #[cfg(feature = "tracing")]
                        tracing::info!(purged = _purged, "Purged expired credentials");
                    }
                    Err(_err) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Failed to purge expired credentials: {_err}");
                    }
                }

                match engine.poll_pending().await {
                    Ok(0) => {}
                    Ok(_settled) => {
                        #[cfg(feature = "tracing")]
                        tracing::info!(settled = _settled, "Observed settled invoices");
                    }
                    Err(_err) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Failed to poll pending invoices: {_err}");
                    }
                }
            }
        })
    }

    /// Ask the backend whether `payment_hash` settled, caching the proof if so.
    ///
    /// The lookup runs on a detached task: if the caller goes away mid-request
    /// the lookup still completes and fills the settlement cache.
    async fn refresh_settlement(&self, payment_hash: PaymentHash) -> Result<Option<Preimage>, L402Error> {
        let lookup = tokio::spawn(lookup_settlement(
            Arc::clone(&self.backend),
            Arc::clone(&self.settlements),
            payment_hash,
            self.config.backend_timeout,
        ));

        lookup
            .await
            .map_err(|err| L402Error::InternalError(format!("Settlement lookup task failed: {err}")))?
    }

    fn is_expired(&self, record: &CredentialRecord, now: DateTime<Utc>) -> Result<bool, L402Error> {
        let expires_at = self.config.expiry_of(record.issued_at)?;
        Ok(expires_at.is_some_and(|expires_at| expires_at <= now))
    }
}

async fn lookup_settlement<B: PaymentBackend>(
    backend: Arc<B>,
    settlements: Arc<dyn SettlementStore>,
    payment_hash: PaymentHash,
    timeout: Duration,
) -> Result<Option<Preimage>, L402Error> {
    let settlement = call_backend(
        timeout,
        BackendOperation::GetSettlement,
        backend.get_settlement(&payment_hash),
    )
    .await
    .inspect_err(|err| {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            payment_hash = %payment_hash,
            operation = %BackendOperation::GetSettlement,
            "Failed to look up settlement: {err}"
        );
    })?;

    if !settlement.settled {
        return Ok(None);
    }

    let preimage = settlement.preimage.ok_or_else(|| {
        L402Error::InternalError(format!(
            "Backend reported invoice {payment_hash} settled without a preimage"
        ))
    })?;

    let stored = settlements.record_preimage(&payment_hash, preimage)?;

    #[cfg(feature = "tracing")]
    tracing::info!(payment_hash = %payment_hash, "Invoice settled");

    Ok(Some(stored))
}

async fn call_backend<T>(
    timeout: Duration,
    operation: BackendOperation,
    call: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, L402Error> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(|err| L402Error::from_backend(operation, err)),
        Err(_) => Err(L402Error::BackendUnavailable {
            operation,
            reason: format!("No response within {timeout:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;

    fn engine(backend: SimulatedBackend, ttl: Option<Duration>) -> L402Engine<SimulatedBackend> {
        L402Engine::builder()
            .backend(backend)
            .config(
                EngineConfig::builder()
                    .backend_timeout(Duration::from_secs(1))
                    .maybe_credential_ttl(ttl)
                    .build(),
            )
            .build()
    }

    #[tokio::test]
    async fn test_challenge_records_pending_settlement() {
        let engine = engine(SimulatedBackend::new(), None);
        let challenge = engine.issue_challenge(1000i64).await.unwrap();

        assert_eq!(challenge.amount.sats(), 1000);
        assert!(challenge.expires_at.is_none());
        assert_eq!(
            engine.settlements().get(&challenge.payment_hash).unwrap(),
            Some(SettlementEntry::Pending)
        );
        assert_eq!(
            engine
                .credentials()
                .get(&challenge.credential)
                .unwrap()
                .map(|record| record.payment_hash),
            Some(challenge.payment_hash)
        );
    }

    #[tokio::test]
    async fn test_invalid_amount_never_reaches_backend() {
        let backend = SimulatedBackend::new();
        let engine = engine(backend.clone(), None);

        assert!(matches!(
            engine.issue_challenge(0i64).await,
            Err(L402Error::InvalidAmount(_))
        ));
        assert!(matches!(
            engine.issue_challenge(-10i64).await,
            Err(L402Error::InvalidAmount(_))
        ));
        assert_eq!(backend.invoice_count(), 0);
    }

    #[tokio::test]
    async fn test_cached_proof_skips_backend() {
        let backend = SimulatedBackend::new();
        let engine = engine(backend.clone(), None);
        let challenge = engine.issue_challenge(10u64).await.unwrap();

        backend.settle(&challenge.payment_hash);
        let proof = backend.preimage_of(&challenge.payment_hash).unwrap().to_hex();

        engine.verify(&proof, &challenge.credential).await.unwrap();
        engine.verify(&proof, &challenge.credential).await.unwrap();
        assert_eq!(backend.settlement_lookups(), 1);
    }

    #[tokio::test]
    async fn test_expired_credential_fails_and_is_purged() {
        let backend = SimulatedBackend::new();
        let engine = engine(backend.clone(), Some(Duration::from_millis(20)));
        let challenge = engine.issue_challenge(10u64).await.unwrap();
        assert!(challenge.expires_at.is_some());

        backend.settle(&challenge.payment_hash);
        let proof = backend.preimage_of(&challenge.payment_hash).unwrap().to_hex();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            engine.verify(&proof, &challenge.credential).await,
            Err(L402Error::AuthenticationFailed)
        ));

        assert_eq!(engine.purge_expired().unwrap(), 1);
        assert!(engine.credentials().get(&challenge.credential).unwrap().is_none());
        assert!(engine.settlements().get(&challenge.payment_hash).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_internal_error() {
        let backend = SimulatedBackend::new();
        let engine = engine(backend.clone(), Some(Duration::from_secs(10_000_000_000_000)));

        assert!(matches!(
            engine.config().validate(),
            Err(L402Error::InternalError(_))
        ));
        assert!(matches!(
            engine.issue_challenge(1000u64).await,
            Err(L402Error::InternalError(_))
        ));
        assert_eq!(backend.invoice_count(), 0);
        assert_eq!(engine.credentials().len().unwrap(), 0);
        assert!(engine.settlements().pending().unwrap().is_empty());
        assert!(matches!(
            engine.purge_expired(),
            Err(L402Error::InternalError(_))
        ));

        // Out of range before any date arithmetic.
        let unbounded = L402Engine::builder()
            .backend(backend)
            .config(
                EngineConfig::builder()
                    .backend_timeout(Duration::from_secs(1))
                    .credential_ttl(Duration::MAX)
                    .build(),
            )
            .build();
        assert!(matches!(
            unbounded.issue_challenge(1000u64).await,
            Err(L402Error::InternalError(_))
        ));
        assert!(unbounded.purge_expired().is_err());
    }

    #[tokio::test]
    async fn test_purge_during_lookup_leaves_no_settlement() {
        let backend = SimulatedBackend::new();
        let engine = engine(backend.clone(), Some(Duration::from_millis(20)));
        let challenge = engine.issue_challenge(10u64).await.unwrap();
        backend.settle(&challenge.payment_hash);
        backend.set_latency(Some(Duration::from_millis(100)));

        let polling = tokio::spawn({
            let engine = engine.clone();
            async move { engine.poll_pending().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(engine.purge_expired().unwrap(), 1);

        polling.await.unwrap().unwrap();
        assert!(engine.settlements().get(&challenge.payment_hash).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_poll_pending_caches_settled_proofs() {
        let backend = SimulatedBackend::new();
        let engine = engine(backend.clone(), None);
        let paid = engine.issue_challenge(10u64).await.unwrap();
        let unpaid = engine.issue_challenge(10u64).await.unwrap();

        backend.settle(&paid.payment_hash);
        assert_eq!(engine.poll_pending().await.unwrap(), 1);

        assert!(matches!(
            engine.settlements().get(&paid.payment_hash).unwrap(),
            Some(SettlementEntry::Settled(_))
        ));
        assert_eq!(
            engine.settlements().pending().unwrap(),
            vec![unpaid.payment_hash]
        );
    }

    #[tokio::test]
    async fn test_empty_credential_requires_challenge() {
        let engine = engine(SimulatedBackend::new(), None);
        assert!(matches!(
            engine.verify("00", &Credential::from("")).await,
            Err(L402Error::ChallengeRequired)
        ));
    }
}
