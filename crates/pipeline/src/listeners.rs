//! Bridge from purchase confirmations to waiting requests.
//!
//! A request that wants to know when a hosted checkout completes calls
//! [`PurchaseListeners::register`] and awaits the returned
//! [`PendingPurchase`]. The webhook handler later calls
//! [`PurchaseListeners::resolve`]. Dropping a `PendingPurchase` before it
//! resolves removes its registration, so an abandoned wait never receives
//! the outcome of a later, unrelated purchase.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use aurapix_core::types::DbId;
use serde::Serialize;
use tokio::sync::oneshot;

/// How a purchase attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PurchaseOutcome {
    #[serde(rename_all = "camelCase")]
    Credited { credit_id: DbId },
    Rejected { reason: String },
}

type Waiters = HashMap<String, Vec<(u64, oneshot::Sender<PurchaseOutcome>)>>;

/// Registry of requests waiting on a transaction id.
#[derive(Clone, Default)]
pub struct PurchaseListeners {
    waiters: Arc<Mutex<Waiters>>,
    next_id: Arc<AtomicU64>,
}

impl PurchaseListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start waiting for `transaction_id`. Several waiters may share an id.
    pub fn register(&self, transaction_id: &str) -> PendingPurchase {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(transaction_id.to_string())
            .or_default()
            .push((id, tx));

        PendingPurchase {
            rx,
            transaction_id: transaction_id.to_string(),
            id,
            listeners: self.clone(),
        }
    }

    /// Complete every waiter on `transaction_id`. Returns how many were
    /// still listening.
    pub fn resolve(&self, transaction_id: &str, outcome: PurchaseOutcome) -> usize {
        let waiters = self.lock().remove(transaction_id).unwrap_or_default();
        let mut delivered = 0;
        for (_, tx) in waiters {
            if tx.send(outcome.clone()).is_ok() {
                delivered += 1;
            }
        }
        if delivered > 0 {
            tracing::debug!(transaction_id, delivered, "Purchase listeners resolved");
        }
        delivered
    }

    /// Number of live registrations across all transaction ids.
    pub fn pending_count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    fn unregister(&self, transaction_id: &str, id: u64) {
        let mut waiters = self.lock();
        if let Some(list) = waiters.get_mut(transaction_id) {
            list.retain(|(waiter_id, _)| *waiter_id != id);
            if list.is_empty() {
                waiters.remove(transaction_id);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Waiters> {
        // A panic while holding the lock cannot leave the map inconsistent.
        self.waiters.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Future side of a registration. Resolves to `None` if the registry was
/// dropped without an outcome.
pub struct PendingPurchase {
    rx: oneshot::Receiver<PurchaseOutcome>,
    transaction_id: String,
    id: u64,
    listeners: PurchaseListeners,
}

impl PendingPurchase {
    /// Wait at most `timeout`. `None` on timeout.
    pub async fn wait(self, timeout: Duration) -> Option<PurchaseOutcome> {
        tokio::time::timeout(timeout, self).await.ok().flatten()
    }
}

impl Future for PendingPurchase {
    type Output = Option<PurchaseOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

impl Drop for PendingPurchase {
    fn drop(&mut self) {
        self.listeners.unregister(&self.transaction_id, self.id);
    }
}
