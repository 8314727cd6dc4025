//! Identity-provider capability surface.
//!
//! The portal signs in through Microsoft's identity platform. This crate does
//! not speak that protocol; it drives whatever implements [`IdentityProvider`].

use std::future::Future;

use url::Url;

use crate::error::Error;

/// Signed-in account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Account {
    pub home_account_id: String,
    pub username: String,
}

impl Account {
    #[must_use]
    pub fn new(home_account_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            home_account_id: home_account_id.into(),
            username: username.into(),
        }
    }
}

/// Result of a login or token acquisition.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TokenAcquisition {
    /// Identity token to submit for backend verification.
    pub identity_token: String,
    pub account: Account,
}

impl TokenAcquisition {
    #[must_use]
    pub fn new(identity_token: impl Into<String>, account: Account) -> Self {
        Self {
            identity_token: identity_token.into(),
            account,
        }
    }
}

/// Operations consumed from the identity provider.
pub trait IdentityProvider: Send + Sync {
    /// Interactive sign-in (popup or redirect).
    fn login(
        &self,
        scopes: &[String],
    ) -> impl Future<Output = Result<TokenAcquisition, Error>> + Send;

    /// Token from the provider's cache or a hidden refresh.
    ///
    /// Fails with [`Error::InteractionRequired`] when the user must act.
    fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: &Account,
    ) -> impl Future<Output = Result<TokenAcquisition, Error>> + Send;

    /// Token acquisition with user interaction.
    fn acquire_token_interactive(
        &self,
        scopes: &[String],
    ) -> impl Future<Output = Result<TokenAcquisition, Error>> + Send;

    fn logout(
        &self,
        post_logout_uri: Option<&Url>,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Silent acquisition, falling back to interaction only when the provider
/// asks for it. Every other failure is returned as is.
///
/// # Errors
///
/// Returns the interactive attempt's error, or the silent attempt's error if
/// it was anything other than [`Error::InteractionRequired`].
pub async fn acquire_token<P: IdentityProvider>(
    provider: &P,
    scopes: &[String],
    account: &Account,
) -> Result<TokenAcquisition, Error> {
    match provider.acquire_token_silent(scopes, account).await {
        Err(Error::InteractionRequired) => {
            tracing::info!(account = %account.username, "Silent token acquisition needs interaction");
            provider.acquire_token_interactive(scopes).await
        }
        other => other,
    }
}
