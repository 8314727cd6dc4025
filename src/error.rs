#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Token is not three dot-segments with a decodable JSON payload.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token expired")]
    TokenExpired,

    /// Backend rejected the identity token or answered with `IsSuccess: false`.
    #[error("Token verification failed: {detail}")]
    VerificationFailed { status: Option<u16>, detail: String },

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API request failed ({operation}): {detail}")]
    Api {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    /// Silent token acquisition needs user interaction.
    #[error("Interaction required")]
    InteractionRequired,

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error ends the current session.
    ///
    /// Session-fatal errors have already cleared all auth state by the time
    /// the caller sees them; the UI should navigate to the login page.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::MalformedToken(_)
            | Self::TokenExpired
            | Self::VerificationFailed { .. }
            | Self::Unauthenticated => true,
            #[cfg(feature = "http")]
            Self::Network(_) => true,
            _ => false,
        }
    }
}
