use std::sync::Arc;

use url::Url;

use super::lock::VerificationLock;
use super::memo::VerificationMemo;
use super::verifier::{TokenVerifier, VerifiedSession};
use crate::clock::Clock;
use crate::error::Error;
use crate::identity::{self, Account, IdentityProvider};
use crate::storage::Storage;
use crate::store::TokenStore;
use crate::token::{self, TokenKind};
use crate::types::UserInfo;

/// Owns the session state: token store, verification memo and lock.
///
/// Construct one per application (or per test) with the storage and clock it
/// should use. Every verification goes through a single async lock, so the
/// response handling of one verification finishes before the next request
/// is sent.
pub struct AuthSessionManager<V> {
    store: TokenStore,
    verifier: V,
    memo: VerificationMemo,
    lock: VerificationLock,
}

impl<V: TokenVerifier> AuthSessionManager<V> {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>, verifier: V) -> Self {
        Self {
            store: TokenStore::new(storage.clone(), clock),
            memo: VerificationMemo::new(storage.clone()),
            lock: VerificationLock::new(storage),
            verifier,
        }
    }

    /// The underlying token store, shared with guards and API clients.
    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Identity token of the verification in flight, if any.
    #[must_use]
    pub fn verification_in_flight(&self) -> Option<String> {
        self.lock.holder()
    }

    /// Verifies `identity_token` with the backend and stores the session.
    ///
    /// A token already verified while the stored pair is still valid is
    /// answered from storage without a backend call.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedToken` if the token cannot be decoded locally
    /// - `Error::TokenExpired` if its `exp` has passed
    /// - `Error::VerificationFailed` if the backend rejects it
    /// - `Error::Network` if the backend cannot be reached
    ///
    /// Every error clears all auth state first.
    pub async fn verify(&self, identity_token: &str) -> Result<UserInfo, Error> {
        let _lock = self.lock.acquire(identity_token).await;

        if self.memo.contains(identity_token) && self.store.is_valid() {
            if let Some(user) = self.store.user_info() {
                tracing::debug!(user_id = %user.user_id, "Identity token already verified");
                return Ok(user);
            }
        }

        match token::is_expired(identity_token, self.store.clock().now()) {
            Ok(false) => {}
            Ok(true) => {
                tracing::info!("Identity token expired before verification");
                self.store.clear();
                return Err(Error::TokenExpired);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting undecodable identity token");
                self.store.clear();
                return Err(e);
            }
        }

        // Leftovers of a lapsed session would arm the expiration timer in the
        // past and clear the new token mid-flight.
        if !self.store.is_valid() && !self.store.read().is_empty() {
            tracing::info!("Discarding lapsed session before verification");
            self.store.clear();
        }

        if let Err(e) = self.store.store(TokenKind::Identity, identity_token) {
            tracing::warn!(error = %e, "Failed to persist identity token");
        }

        let outcome = self
            .verifier
            .verify(identity_token)
            .await
            .and_then(|response| response.into_session())
            .and_then(|session| self.commit(identity_token, session));

        match outcome {
            Ok(user) => {
                tracing::info!(user_id = %user.user_id, "Identity token verified");
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token verification failed; clearing session");
                self.store.clear();
                Err(e)
            }
        }
    }

    /// Signs in through `provider` and verifies the resulting identity token.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, or any error of [`verify`](Self::verify).
    pub async fn login<P: IdentityProvider>(
        &self,
        provider: &P,
        scopes: &[String],
    ) -> Result<UserInfo, Error> {
        let acquired = provider.login(scopes).await?;
        self.verify(&acquired.identity_token).await
    }

    /// Re-acquires and re-verifies tokens when the session expires within
    /// `window`. Returns `None` when no refresh was needed.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error, or any error of [`verify`](Self::verify).
    pub async fn refresh_if_expiring<P: IdentityProvider>(
        &self,
        provider: &P,
        scopes: &[String],
        account: &Account,
        window: time::Duration,
    ) -> Result<Option<UserInfo>, Error> {
        if !self.store.expires_within(window) {
            return Ok(None);
        }
        tracing::debug!(account = %account.username, "Session expiring soon; refreshing");
        let acquired = identity::acquire_token(provider, scopes, account).await?;
        self.verify(&acquired.identity_token).await.map(Some)
    }

    /// Clears all local auth state, then signs out of the identity provider.
    ///
    /// Local state is cleared even when the provider call fails.
    ///
    /// # Errors
    ///
    /// Returns the provider's logout error.
    pub async fn logout<P: IdentityProvider>(
        &self,
        provider: &P,
        post_logout_uri: Option<&Url>,
    ) -> Result<(), Error> {
        self.store.clear();
        tracing::info!("Signed out");
        provider.logout(post_logout_uri).await
    }

    /// Writes the whole pair; the identity record from before the backend
    /// call may have been cleared by expiry in the meantime.
    fn commit(&self, identity_token: &str, session: VerifiedSession) -> Result<UserInfo, Error> {
        self.store.store(TokenKind::Identity, identity_token)?;
        self.store.store(TokenKind::Backend, &session.backend_token)?;
        self.store.set_user_info(&session.user)?;
        self.store.mark_authenticated()?;
        self.memo.insert(identity_token)?;
        Ok(session.user)
    }
}
