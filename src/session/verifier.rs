use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::types::{RoleSet, UserInfo};

/// Backend check of an identity token.
///
/// Implemented over HTTP by [`HttpTokenVerifier`]; tests supply their own.
pub trait TokenVerifier: Send + Sync + 'static {
    /// Submits `identity_token` for verification.
    ///
    /// Returns the decoded response body for 2xx answers, whether or not the
    /// backend accepted the token. Non-2xx answers are errors.
    fn verify(
        &self,
        identity_token: &str,
    ) -> impl Future<Output = Result<VerifyResponse, Error>> + Send;
}

/// Body of the verification request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct VerifyRequest<'a> {
    pub(crate) token: &'a str,
}

/// Body of the verification response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
#[non_exhaustive]
pub struct VerifyResponse {
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub jwt_token: Option<String>,
    /// Backend sends either a number or a string.
    #[serde(default)]
    pub user_id: Option<JsonValue>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role_ids: Vec<JsonValue>,
    #[serde(default)]
    pub error_detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome of an accepted verification.
#[derive(Debug, Clone)]
pub(crate) struct VerifiedSession {
    pub(crate) backend_token: String,
    pub(crate) user: UserInfo,
}

impl VerifyResponse {
    /// Successful response carrying the given backend token and profile.
    #[must_use]
    pub fn success(backend_token: impl Into<String>, user: &UserInfo) -> Self {
        Self {
            is_success: true,
            jwt_token: Some(backend_token.into()),
            user_id: Some(JsonValue::String(user.user_id.to_string())),
            full_name: Some(user.full_name.clone()),
            email: Some(user.email.clone()),
            phone_number: user.phone_number.clone(),
            role_ids: user.role_ids.iter().map(|r| JsonValue::from(r.id())).collect(),
            ..Self::default()
        }
    }

    /// Rejection carrying a server-supplied detail.
    #[must_use]
    pub fn rejected(detail: impl Into<String>) -> Self {
        Self {
            error_detail: Some(detail.into()),
            ..Self::default()
        }
    }

    /// Server-supplied explanation, preferring `ErrorDetail` over `Message`.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.error_detail
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub(crate) fn into_session(self) -> Result<VerifiedSession, Error> {
        if !self.is_success {
            return Err(Error::VerificationFailed {
                status: None,
                detail: self.detail().unwrap_or("token rejected").to_owned(),
            });
        }

        let backend_token = self
            .jwt_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::VerificationFailed {
                status: None,
                detail: "response missing JwtToken".into(),
            })?;

        let user_id = match self.user_id {
            Some(JsonValue::String(s)) => s,
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => {
                return Err(Error::VerificationFailed {
                    status: None,
                    detail: "response missing UserId".into(),
                });
            }
        };

        let mut user = UserInfo::new(
            user_id,
            self.full_name.unwrap_or_default(),
            self.email.unwrap_or_default(),
        )
        .with_roles(RoleSet::from_json_values(&self.role_ids));
        user.phone_number = self.phone_number;

        Ok(VerifiedSession {
            backend_token,
            user,
        })
    }
}

#[cfg(feature = "http")]
pub use http::HttpTokenVerifier;

#[cfg(feature = "http")]
mod http {
    use url::Url;

    use super::{TokenVerifier, VerifyRequest, VerifyResponse};
    use crate::error::Error;

    /// Posts identity tokens to the portal's verify endpoint.
    #[derive(Debug, Clone)]
    pub struct HttpTokenVerifier {
        verify_url: Url,
        http: reqwest::Client,
    }

    impl HttpTokenVerifier {
        #[must_use]
        pub fn new(verify_url: Url) -> Self {
            Self {
                verify_url,
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
        pub fn verify_url(&self) -> &Url {
            &self.verify_url
        }
    }

    impl TokenVerifier for HttpTokenVerifier {
        async fn verify(&self, identity_token: &str) -> Result<VerifyResponse, Error> {
            let response = self
                .http
                .post(self.verify_url.clone())
                .json(&VerifyRequest {
                    token: identity_token,
                })
                .send()
                .await?;

            if response.status().is_success() {
                return response.json::<VerifyResponse>().await.map_err(Into::into);
            }

            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            // Error bodies usually carry the same shape; fall back to raw text.
            let detail = serde_json::from_str::<VerifyResponse>(&body)
                .ok()
                .and_then(|r| r.detail().map(str::to_owned))
                .unwrap_or(body);
            Err(Error::VerificationFailed {
                status: Some(status),
                detail,
            })
        }
    }
}
