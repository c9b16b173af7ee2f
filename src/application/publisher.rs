// Snapshot publisher - Latest snapshot plus observer fan-out
use crate::domain::error::DashboardError;
use crate::domain::snapshot::Snapshot;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Receives every published snapshot. Implementations must treat the
/// snapshot as read-only display input and should return quickly.
pub trait SnapshotObserver: Send + Sync {
    fn on_snapshot(&self, snapshot: &Arc<Snapshot>) -> anyhow::Result<()>;
}

impl<F> SnapshotObserver for F
where
    F: Fn(&Arc<Snapshot>) -> anyhow::Result<()> + Send + Sync,
{
    fn on_snapshot(&self, snapshot: &Arc<Snapshot>) -> anyhow::Result<()> {
        self(snapshot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

type Subscribers = Vec<(SubscriptionToken, Arc<dyn SnapshotObserver>)>;

pub struct SnapshotPublisher {
    subscribers: Mutex<Subscribers>,
    latest: RwLock<Option<Arc<Snapshot>>>,
    // Serialises publications so observers see sequences in order
    delivery: Mutex<()>,
    next_token: AtomicU64,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            latest: RwLock::new(None),
            delivery: Mutex::new(()),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn SnapshotObserver>) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.lock_subscribers().push((token, observer));
        tracing::debug!("Observer {} subscribed", token.id());
        token
    }

    /// Remove an observer. Returns false if the token was not subscribed.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(t, _)| *t != token);
        let removed = subscribers.len() != before;
        if removed {
            tracing::debug!("Observer {} unsubscribed", token.id());
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Store `snapshot` as latest and notify observers in registration
    /// order. Returns the number of observers notified, or `None` when the
    /// snapshot is not newer than the latest one and was dropped.
    pub fn publish(&self, snapshot: Arc<Snapshot>) -> Option<usize> {
        let _delivery = self.delivery.lock().unwrap_or_else(|e| e.into_inner());

        {
            let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
            if let Some(current) = latest.as_ref() {
                if current.sequence >= snapshot.sequence {
                    tracing::debug!(
                        "Dropping snapshot {} (latest is {})",
                        snapshot.sequence,
                        current.sequence
                    );
                    return None;
                }
            }
            *latest = Some(snapshot.clone());
        }

        // Observers added or removed during delivery take effect next time
        let subscribers: Subscribers = self.lock_subscribers().clone();

        for (token, observer) in &subscribers {
            if let Err(failure) = Self::notify(*token, observer.as_ref(), &snapshot) {
                tracing::warn!("{}", failure);
            }
        }

        Some(subscribers.len())
    }

    fn notify(
        token: SubscriptionToken,
        observer: &dyn SnapshotObserver,
        snapshot: &Arc<Snapshot>,
    ) -> Result<(), DashboardError> {
        match catch_unwind(AssertUnwindSafe(|| observer.on_snapshot(snapshot))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DashboardError::ObserverFailure {
                token: token.id(),
                reason: e.to_string(),
            }),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "observer panicked".to_string());
                Err(DashboardError::ObserverFailure {
                    token: token.id(),
                    reason,
                })
            }
        }
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}
