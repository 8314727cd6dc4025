#![doc = include_str!("../README.md")]

#[cfg(feature = "http")]
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod policy;
pub mod route;
pub mod session;
pub mod storage;
pub mod store;
pub mod token;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
#[cfg(feature = "http")]
pub use api::ApiClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AccessConfig;
pub use error::Error;
pub use guard::{AuthGuard, GuardDecision};
pub use identity::{Account, IdentityProvider, TokenAcquisition, acquire_token};
pub use policy::{PolicyTable, RolePolicy, RoutePattern};
pub use route::{can_access_route, default_redirect};
#[cfg(feature = "http")]
pub use session::HttpTokenVerifier;
pub use session::{AuthSessionManager, TokenVerifier, VerifyResponse};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{SessionEvent, TokenPair, TokenStore};
pub use token::{TokenKind, UnverifiedClaims, decode_unverified, token_expiry};
pub use types::{Role, RoleSet, UserId, UserInfo, parse_role_set};
