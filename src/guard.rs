//! Navigation gate combining session liveness and route policy.

use std::sync::Arc;

use crate::policy::PolicyTable;
use crate::route::{can_access_route, default_redirect};
use crate::store::TokenStore;

/// Outcome of a navigation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

impl GuardDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Redirect target, if navigation was refused.
    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Redirect(path) => Some(path.as_str()),
        }
    }
}

/// Route guard over a token store and policy table.
///
/// Denials are silent: the guard only says where to go instead.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    store: TokenStore,
    policies: Arc<PolicyTable>,
    login_path: String,
    root_path: String,
}

impl AuthGuard {
    #[must_use]
    pub fn new(store: TokenStore, policies: Arc<PolicyTable>) -> Self {
        Self {
            store,
            policies,
            login_path: "/login".into(),
            root_path: "/".into(),
        }
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

    /// Decides whether the caller may open `path`.
    ///
    /// `externally_authenticated` reports whether the identity provider still
    /// has a signed-in account.
    #[must_use]
    pub fn evaluate(&self, path: &str, externally_authenticated: bool) -> GuardDecision {
        if let Some(redirect) = self.require_session(externally_authenticated) {
            return redirect;
        }
        self.check_route(path)
    }

    /// Like [`evaluate`](Self::evaluate), but callers without an admin role
    /// are sent to the root path.
    #[must_use]
    pub fn evaluate_admin(&self, path: &str, externally_authenticated: bool) -> GuardDecision {
        if let Some(redirect) = self.require_session(externally_authenticated) {
            return redirect;
        }
        if !self.store.roles().has_admin() {
            tracing::debug!(path, "Admin route refused to non-admin caller");
            return GuardDecision::Redirect(self.root_path.clone());
        }
        self.check_route(path)
    }

    fn require_session(&self, externally_authenticated: bool) -> Option<GuardDecision> {
        let valid = self.store.is_valid();
        if externally_authenticated && valid {
            return None;
        }
        // A void pair must not linger half-written; a valid one is kept.
        if !valid && !self.store.read().is_empty() {
            tracing::info!("Session no longer valid; clearing auth state");
            self.store.clear();
        }
        Some(GuardDecision::Redirect(self.login_path.clone()))
    }

    fn check_route(&self, path: &str) -> GuardDecision {
        let roles = self.store.roles();
        if can_access_route(&self.policies, path, &roles) {
            return GuardDecision::Allow;
        }
        let target = default_redirect(&self.policies, &roles, &self.login_path);
        tracing::debug!(path, redirect = %target, "Route not permitted for caller roles");
        GuardDecision::Redirect(target.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use crate::test_support::mint_token;
    use crate::token::TokenKind;
    use crate::types::{Role, RoleSet, UserInfo};

    const NOW: i64 = 1_700_000_000;

    fn guard_for(roles: RoleSet, backend_exp: i64) -> (AuthGuard, TokenStore) {
        let store = TokenStore::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(ManualClock::at_unix(NOW)),
        );
        store.store(TokenKind::Identity, &mint_token(NOW + 600)).unwrap();
        store.store(TokenKind::Backend, &mint_token(backend_exp)).unwrap();
        store
            .set_user_info(&UserInfo::new("1", "Test", "t@example.com").with_roles(roles))
            .unwrap();
        store.mark_authenticated().unwrap();
        let guard = AuthGuard::new(store.clone(), Arc::new(PolicyTable::standard()));
        (guard, store)
    }

    #[test]
    fn er_admin_opens_admin() {
        let (guard, _) = guard_for(RoleSet::from([Role::ER_ADMIN]), NOW + 600);
        assert_eq!(guard.evaluate("/admin", true), GuardDecision::Allow);
        assert_eq!(guard.evaluate_admin("/admin", true), GuardDecision::Allow);
    }

    #[test]
    fn er_member_redirected_from_admin() {
        let (guard, _) = guard_for(RoleSet::from([Role::ER_MEMBER]), NOW + 600);
        assert_eq!(
            guard.evaluate("/admin", true),
            GuardDecision::Redirect("/".into())
        );
        assert_eq!(
            guard.evaluate_admin("/admin", true),
            GuardDecision::Redirect("/".into())
        );
    }

    #[test]
    fn no_roles_redirects_to_login() {
        let (guard, _) = guard_for(RoleSet::new(), NOW + 600);
        let decision = guard.evaluate("/", true);
        assert_eq!(decision.redirect_target(), Some("/login"));
    }

    #[test]
    fn missing_external_session_redirects_but_keeps_valid_pair() {
        let (guard, store) = guard_for(RoleSet::from([Role::ADMIN]), NOW + 600);
        assert_eq!(
            guard.evaluate("/", false),
            GuardDecision::Redirect("/login".into())
        );
        assert!(store.is_valid());
        assert!(store.user_info().is_some());
        assert_eq!(guard.evaluate("/", true), GuardDecision::Allow);
    }

    #[test]
    fn expired_backend_token_clears_and_redirects() {
        let (guard, store) = guard_for(RoleSet::from([Role::ADMIN]), NOW - 5);
        assert_eq!(
            guard.evaluate("/admin", true),
            GuardDecision::Redirect("/login".into())
        );
        assert!(store.user_info().is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn admin_variant_uses_configured_root() {
        let (guard, _) = guard_for(RoleSet::from([Role::USER]), NOW + 600);
        let guard = guard.with_root_path("/home").with_login_path("/sign-in");
        assert_eq!(
            guard.evaluate_admin("/admin", true),
            GuardDecision::Redirect("/home".into())
        );
        assert_eq!(
            guard.evaluate("/", false),
            GuardDecision::Redirect("/sign-in".into())
        );
    }

    #[test]
    fn user_reaches_own_request() {
        let (guard, _) = guard_for(RoleSet::from([Role::USER]), NOW + 600);
        assert!(guard.evaluate("/request/17/action", true).is_allowed());
        assert!(!guard.evaluate("/chat", true).is_allowed());
    }
}
