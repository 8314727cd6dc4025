//! Authenticated client for the portal's REST backend.

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::join_under;
use crate::error::Error;
use crate::store::TokenStore;

/// REST client that sends the backend token as a bearer credential.
///
/// Requests are refused locally while the session is invalid. A `401` from
/// the backend voids the session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    store: TokenStore,
    http: reqwest::Client,
}

impl ApiClient {
    #[must_use]
    pub fn new(base_url: Url, store: TokenStore) -> Self {
        Self {
            base_url,
            store,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET path`, decoding a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a valid session or on `401`,
    /// [`Error::Network`] on transport failure, or [`Error::Api`] for other
    /// non-success statuses.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let token = self.bearer()?;
        let response = self
            .http
            .get(self.url(path)?)
            .bearer_auth(token)
            .send()
            .await?;
        let response = self.ensure_success(response, "get").await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// `POST path` with a JSON body, decoding a JSON response.
    ///
    /// # Errors
    ///
    /// Same as [`get_json`](Self::get_json).
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.bearer()?;
        let response = self
            .http
            .post(self.url(path)?)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        let response = self.ensure_success(response, "post").await?;
        response.json::<T>().await.map_err(Into::into)
    }

    fn bearer(&self) -> Result<String, Error> {
        if !self.store.is_valid() {
            return Err(Error::Unauthenticated);
        }
        self.store.read().backend.ok_or(Error::Unauthenticated)
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        join_under(&self.base_url, path)
            .map_err(|e| Error::Config(format!("invalid API path {path:?}: {e}")))
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %response.url(), "Backend rejected bearer token; clearing session");
            self.store.clear();
            return Err(Error::Unauthenticated);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            operation,
            status: Some(status.as_u16()),
            detail: body,
        })
    }
}
