//! Persisted token pair, user info and the expiration timer.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::error::Error;
use crate::storage::{Storage, keys};
use crate::token::{self, TokenKind};
use crate::types::{RoleSet, UserInfo, parse_role_set};

/// Session lifecycle notifications for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// No session, or the session was cleared.
    SignedOut,
    /// Verification succeeded and the session is usable.
    Active,
    /// The expiration timer fired; the UI should navigate to login.
    Expired,
}

/// The two bearer tokens as currently persisted. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPair {
    pub identity: Option<String>,
    pub backend: Option<String>,
}

impl TokenPair {
    /// Both tokens are present (expiry not considered).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.identity.is_some() && self.backend.is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identity.is_none() && self.backend.is_none()
    }
}

/// Persisted form of one token; `expires_at` is absent for malformed tokens.
#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    value: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

fn storage_key(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Identity => keys::IDENTITY_TOKEN,
        TokenKind::Backend => keys::BACKEND_TOKEN,
    }
}

struct StoreInner {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    timer: Mutex<Option<JoinHandle<()>>>,
    events: watch::Sender<SessionEvent>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

/// Token store over injected storage and clock.
///
/// Cheap to clone; clones share state. Validity is always re-derived from the
/// persisted tokens on use. The expiration timer only notifies early and is
/// never the sole source of truth.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<StoreInner>,
}

impl TokenStore {
    /// Opens a store over `storage`. Tokens already persisted there get an
    /// expiration timer straight away.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = watch::channel(SessionEvent::SignedOut);
        let store = Self {
            inner: Arc::new(StoreInner {
                storage,
                clock,
                timer: Mutex::new(None),
                events,
            }),
        };
        store.arm_expiration_timer();
        store
    }

    /// Persists `token` under `kind` and re-arms the expiration timer.
    ///
    /// A token whose expiry cannot be decoded is still persisted, without
    /// expiry tracking.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the storage write fails.
    pub fn store(&self, kind: TokenKind, token: &str) -> Result<(), Error> {
        let expires_at = match token::token_expiry(token) {
            Ok(exp) => Some(exp.unix_timestamp()),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Token expiry unknown; not tracking");
                None
            }
        };

        let record = TokenRecord {
            value: token.to_owned(),
            expires_at,
        };
        let json = serde_json::to_string(&record).map_err(|e| Error::Storage(e.to_string()))?;
        self.inner.storage.set(storage_key(kind), &json)?;

        self.arm_expiration_timer();
        Ok(())
    }

    /// Currently persisted tokens.
    #[must_use]
    pub fn read(&self) -> TokenPair {
        TokenPair {
            identity: self.read_record(TokenKind::Identity).map(|r| r.value),
            backend: self.read_record(TokenKind::Backend).map(|r| r.value),
        }
    }

    /// Both tokens present and neither past its `exp`.
    ///
    /// Expiry is decoded again on every call rather than trusted from the
    /// timer, which may not have fired after a suspend. A token without a
    /// readable expiry is not valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let TokenPair {
            identity: Some(identity),
            backend: Some(backend),
        } = self.read()
        else {
            return false;
        };

        let now = self.inner.clock.now();
        [identity, backend]
            .iter()
            .all(|t| matches!(token::is_expired(t, now), Ok(false)))
    }

    /// Removes tokens, user info, auth flag and the verification memo, and
    /// cancels the expiration timer.
    ///
    /// Deletes are sequential; a failing delete is logged and the rest still
    /// run.
    pub fn clear(&self) {
        self.clear_with(SessionEvent::SignedOut);
    }

    /// Profile stored by the last successful verification.
    #[must_use]
    pub fn user_info(&self) -> Option<UserInfo> {
        let raw = self.get(keys::USER_INFO)?;
        match serde_json::from_str::<UserInfo>(&raw) {
            Ok(info) => Some(info.with_roles(self.roles())),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable user info");
                None
            }
        }
    }

    /// Persists `info`; roles go to their own key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if either write fails.
    pub fn set_user_info(&self, info: &UserInfo) -> Result<(), Error> {
        let json = serde_json::to_string(info).map_err(|e| Error::Storage(e.to_string()))?;
        let roles = serde_json::to_string(&info.role_ids)
            .map_err(|e| Error::Storage(e.to_string()))?;
        self.inner.storage.set(keys::USER_INFO, &json)?;
        self.inner.storage.set(keys::ROLE_IDS, &roles)
    }

    /// Roles of the signed-in caller; empty when signed out.
    #[must_use]
    pub fn roles(&self) -> RoleSet {
        self.get(keys::ROLE_IDS)
            .map(|raw| parse_role_set(&raw))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.get(keys::AUTH_STATE).as_deref() == Some("true")
    }

    /// Sets the auth-state flag and announces [`SessionEvent::Active`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the write fails.
    pub fn mark_authenticated(&self) -> Result<(), Error> {
        self.inner.storage.set(keys::AUTH_STATE, "true")?;
        self.inner.events.send_replace(SessionEvent::Active);
        Ok(())
    }

    /// Earliest `exp` among the persisted tokens.
    #[must_use]
    pub fn soonest_expiry(&self) -> Option<OffsetDateTime> {
        [TokenKind::Identity, TokenKind::Backend]
            .into_iter()
            .filter_map(|kind| self.read_record(kind)?.expires_at)
            .min()
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
    }

    /// Whether the session expires within `window` from now.
    #[must_use]
    pub fn expires_within(&self, window: time::Duration) -> bool {
        self.soonest_expiry()
            .is_some_and(|exp| exp - self.inner.clock.now() <= window)
    }

    /// Receiver of session lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.inner.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key, error = %e, "Storage read failed");
                None
            }
        }
    }

    fn read_record(&self, kind: TokenKind) -> Option<TokenRecord> {
        let raw = self.get(storage_key(kind))?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "Discarding unreadable token record");
                None
            }
        }
    }

    fn clear_with(&self, event: SessionEvent) {
        if let Some(handle) = self.inner.timer.lock().take() {
            handle.abort();
        }

        for key in [
            keys::IDENTITY_TOKEN,
            keys::BACKEND_TOKEN,
            keys::USER_INFO,
            keys::ROLE_IDS,
            keys::AUTH_STATE,
            keys::VERIFIED_TOKENS,
        ] {
            if let Err(e) = self.inner.storage.remove(key) {
                tracing::error!(key, error = %e, "Failed to remove auth state");
            }
        }

        self.inner.events.send_replace(event);
    }

    /// Replaces the pending timer with one for the soonest known expiry.
    fn arm_expiration_timer(&self) {
        let mut slot = self.inner.timer.lock();
        if let Some(old) = slot.take() {
            old.abort();
        }

        let Some(expires_at) = self.soonest_expiry() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; expiration timer not armed");
            return;
        };

        let delay = std::time::Duration::try_from(expires_at - self.inner.clock.now())
            .unwrap_or_default();
        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);

        *slot = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.timer.lock().take();
            let store = TokenStore { inner };
            // Tokens re-stored since arming push the deadline out.
            let extended = store
                .soonest_expiry()
                .is_some_and(|next| next > expires_at);
            if store.is_valid() || extended {
                store.arm_expiration_timer();
                return;
            }
            tracing::info!("Session expired; clearing auth state");
            store.clear_with(SessionEvent::Expired);
        }));
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("authenticated", &self.is_authenticated())
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}
