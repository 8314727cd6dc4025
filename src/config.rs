use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::error::Error;
use crate::storage::{FileStorage, MemoryStorage, Storage};

/// Portal access configuration.
///
/// The backend base URL is a constructor parameter; everything else has a
/// default and a `with_*` override.
///
/// ```rust,ignore
/// use er_access::AccessConfig;
///
/// let config = AccessConfig::new("https://er.example.com/".parse()?)
///     .with_login_path("/sign-in");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AccessConfig {
    pub(crate) api_base_url: Url,
    pub(crate) verify_path: String,
    pub(crate) login_path: String,
    pub(crate) root_path: String,
    pub(crate) scopes: Vec<String>,
    pub(crate) post_logout_uri: Option<Url>,
    pub(crate) storage_path: Option<PathBuf>,
}

impl AccessConfig {
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            verify_path: "/api/auth/verify-token".into(),
            login_path: "/login".into(),
            root_path: "/".into(),
            scopes: vec!["User.Read".into()],
            post_logout_uri: None,
            storage_path: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `ER_API_BASE_URL`: portal backend base URL
    ///
    /// # Optional env vars
    /// - `ER_VERIFY_PATH`: token verification endpoint path
    /// - `ER_LOGIN_PATH`: login route of the UI
    /// - `ER_ROOT_PATH`: root route of the UI
    /// - `ER_SCOPES`: comma-separated identity-provider scopes
    /// - `ER_POST_LOGOUT_URI`: where the identity provider returns after logout
    /// - `ER_STORAGE_PATH`: JSON file for persisted session state
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required vars are missing or URLs are invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required keys are missing or URLs are invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base = lookup("ER_API_BASE_URL")
            .ok_or_else(|| Error::Config("ER_API_BASE_URL is required".into()))?;
        let base: Url = base
            .parse()
            .map_err(|e| Error::Config(format!("ER_API_BASE_URL: {e}")))?;

        let mut config = Self::new(base);

        if let Some(path) = lookup("ER_VERIFY_PATH") {
            config = config.with_verify_path(path);
        }
        if let Some(path) = lookup("ER_LOGIN_PATH") {
            config = config.with_login_path(path);
        }
        if let Some(path) = lookup("ER_ROOT_PATH") {
            config = config.with_root_path(path);
        }
        if let Some(scopes) = lookup("ER_SCOPES") {
            config = config.with_scopes(
                scopes
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }
        if let Some(uri) = lookup("ER_POST_LOGOUT_URI") {
            let uri: Url = uri
                .parse()
                .map_err(|e| Error::Config(format!("ER_POST_LOGOUT_URI: {e}")))?;
            config = config.with_post_logout_uri(uri);
        }
        if let Some(path) = lookup("ER_STORAGE_PATH") {
            config = config.with_storage_path(path);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_verify_path(mut self, path: impl Into<String>) -> Self {
        self.verify_path = path.into();
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_root_path(mut self, path: impl Into<String>) -> Self {
        self.root_path = path.into();
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_post_logout_uri(mut self, uri: Url) -> Self {
        self.post_logout_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn post_logout_uri(&self) -> Option<&Url> {
        self.post_logout_uri.as_ref()
    }

    /// Full URL of the verification endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the verify path does not form a valid URL.
    pub fn verify_url(&self) -> Result<Url, Error> {
        join_under(&self.api_base_url, &self.verify_path)
            .map_err(|e| Error::Config(format!("verify path {:?}: {e}", self.verify_path)))
    }

    /// Storage selected by the config: a JSON file when `storage_path` is
    /// set, process memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file exists but cannot be read.
    pub fn open_storage(&self) -> Result<Arc<dyn Storage>, Error> {
        Ok(match &self.storage_path {
            Some(path) => Arc::new(FileStorage::open(path)?),
            None => Arc::new(MemoryStorage::new()),
        })
    }

    /// HTTP verifier pointed at [`verify_url`](Self::verify_url).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the verify URL is invalid.
    #[cfg(feature = "http")]
    pub fn verifier(&self) -> Result<crate::session::HttpTokenVerifier, Error> {
        Ok(crate::session::HttpTokenVerifier::new(self.verify_url()?))
    }
}

/// Joins `path` below `base`, keeping any path prefix the base carries.
pub(crate) fn join_under(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = AccessConfig::new("https://er.example.com/".parse().unwrap());
        assert_eq!(config.login_path(), "/login");
        assert_eq!(config.root_path(), "/");
        assert_eq!(config.scopes(), &["User.Read"]);
        assert_eq!(
            config.verify_url().unwrap().as_str(),
            "https://er.example.com/api/auth/verify-token"
        );
    }

    #[test]
    fn verify_url_keeps_base_prefix() {
        let config = AccessConfig::new("https://er.example.com/portal/".parse().unwrap());
        assert_eq!(
            config.verify_url().unwrap().as_str(),
            "https://er.example.com/portal/api/auth/verify-token"
        );

        let config = AccessConfig::new("https://er.example.com/portal".parse().unwrap())
            .with_verify_path("api/Account/verify-token");
        assert_eq!(
            config.verify_url().unwrap().as_str(),
            "https://er.example.com/portal/api/Account/verify-token"
        );
    }

    #[test]
    fn base_url_is_required() {
        let err = AccessConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn invalid_base_url_rejected() {
        let err = AccessConfig::from_lookup(lookup(&[("ER_API_BASE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn overrides_from_lookup() {
        let config = AccessConfig::from_lookup(lookup(&[
            ("ER_API_BASE_URL", "https://er.example.com"),
            ("ER_VERIFY_PATH", "/api/Account/verify-token"),
            ("ER_LOGIN_PATH", "/sign-in"),
            ("ER_SCOPES", "openid, User.Read,"),
            ("ER_POST_LOGOUT_URI", "https://er.example.com/bye"),
        ]))
        .unwrap();

        assert_eq!(config.login_path(), "/sign-in");
        assert_eq!(config.scopes(), &["openid", "User.Read"]);
        assert_eq!(
            config.verify_url().unwrap().as_str(),
            "https://er.example.com/api/Account/verify-token"
        );
        assert_eq!(
            config.post_logout_uri().map(Url::as_str),
            Some("https://er.example.com/bye")
        );
    }

    #[test]
    fn storage_path_selects_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let config = AccessConfig::new("https://er.example.com/".parse().unwrap())
            .with_storage_path(&path);

        let storage = config.open_storage().unwrap();
        storage.set("k", "v").unwrap();
        assert!(path.exists());
    }
}
