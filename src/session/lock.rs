use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::storage::{Storage, keys};

/// Delay between checks of a slot held through another view of the storage.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A slot held longer than this is assumed abandoned and taken over.
const MAX_FOREIGN_WAIT: Duration = Duration::from_secs(10);

/// Single-slot lock around backend verification.
///
/// Waiters in this process queue in FIFO order on an async mutex. The
/// holder's token is also written to a slot in storage; a lock over the same
/// storage (another manager, another process) polls that slot and waits while
/// it names a different token.
pub(crate) struct VerificationLock {
    mutex: Mutex<()>,
    storage: Arc<dyn Storage>,
}

/// Held for one verification attempt. Dropping it frees the slot, whichever
/// way the attempt ended.
pub(crate) struct VerificationLockGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    storage: &'a Arc<dyn Storage>,
    token: String,
}

impl VerificationLock {
    pub(crate) fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            mutex: Mutex::new(()),
            storage,
        }
    }

    pub(crate) async fn acquire(&self, identity_token: &str) -> VerificationLockGuard<'_> {
        let guard = match self.mutex.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("Verification in flight; waiting for lock");
                self.mutex.lock().await
            }
        };

        self.wait_for_foreign_holder(identity_token).await;

        if let Err(e) = self.storage.set(keys::VERIFICATION_LOCK, identity_token) {
            tracing::warn!(error = %e, "Failed to record verification lock");
        }

        VerificationLockGuard {
            _guard: guard,
            storage: &self.storage,
            token: identity_token.to_owned(),
        }
    }

    /// Token of the verification currently in flight.
    pub(crate) fn holder(&self) -> Option<String> {
        self.storage.get(keys::VERIFICATION_LOCK).ok().flatten()
    }

    async fn wait_for_foreign_holder(&self, identity_token: &str) {
        let mut waited = Duration::ZERO;
        while self
            .holder()
            .is_some_and(|holder| holder != identity_token)
        {
            if waited >= MAX_FOREIGN_WAIT {
                tracing::warn!(
                    waited_ms = waited.as_millis() as u64,
                    "Verification lock looks abandoned; taking it over"
                );
                return;
            }
            if waited.is_zero() {
                tracing::debug!("Verification in flight elsewhere; polling lock slot");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            waited += POLL_INTERVAL;
        }
    }
}

impl Drop for VerificationLockGuard<'_> {
    fn drop(&mut self) {
        match self.storage.get(keys::VERIFICATION_LOCK) {
            Ok(Some(holder)) if holder != self.token => {
                tracing::debug!("Verification lock slot taken over; leaving it");
            }
            Ok(Some(_)) => {
                if let Err(e) = self.storage.remove(keys::VERIFICATION_LOCK) {
                    tracing::warn!(error = %e, "Failed to release verification lock record");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read verification lock record"),
        }
    }
}
