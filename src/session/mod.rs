//! Backend verification of identity tokens.
//!
//! [`AuthSessionManager`] turns an identity-provider token into a stored
//! session. Verified tokens are memoised in storage, and a single async lock
//! serialises verification so two responses never write the store at once.

mod lock;
mod manager;
mod memo;
mod verifier;

pub use manager::AuthSessionManager;
#[cfg(feature = "http")]
pub use verifier::HttpTokenVerifier;
pub use verifier::{TokenVerifier, VerifyResponse};
