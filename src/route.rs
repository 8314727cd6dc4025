//! Route authorization over a [`PolicyTable`].
//!
//! Multi-role callers get the union of their roles' routes: any one role
//! allowing a path is enough. A caller holding a low-privilege and a
//! high-privilege role therefore sees the high-privilege route set.

use crate::policy::PolicyTable;
use crate::types::RoleSet;

/// Whether a caller holding `roles` may open `path`.
///
/// Fails closed: an empty role set or roles without a policy never match.
#[must_use]
pub fn can_access_route(table: &PolicyTable, path: &str, roles: &RoleSet) -> bool {
    roles
        .iter()
        .filter_map(|role| table.policy_for(role))
        .any(|policy| policy.allows(path))
}

/// Landing page for a caller holding `roles`.
///
/// The numerically smallest role decides. Callers without roles, or whose
/// smallest role has no policy, land on `login_path`.
#[must_use]
pub fn default_redirect<'a>(table: &'a PolicyTable, roles: &RoleSet, login_path: &'a str) -> &'a str {
    roles
        .highest_priority()
        .and_then(|role| table.policy_for(role))
        .map_or(login_path, |policy| policy.default_redirect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{RolePolicy, RoutePattern};
    use crate::types::Role;

    const PATHS: &[&str] = &[
        "/",
        "/admin",
        "/chat",
        "/request/7",
        "/request/7/action",
        "/request/7/extra",
        "/anything/at/all",
        "",
    ];

    #[test]
    fn empty_roles_fail_closed() {
        let table = PolicyTable::standard();
        for path in PATHS {
            assert!(!can_access_route(&table, path, &RoleSet::new()), "{path}");
        }
    }

    #[test]
    fn wildcard_grants_every_path() {
        let table = PolicyTable::standard();
        let roles = RoleSet::from([Role::ADMIN]);
        for path in PATHS {
            assert!(can_access_route(&table, path, &roles), "{path}");
        }
    }

    #[test]
    fn union_of_roles() {
        let table = PolicyTable::builder()
            .role(Role(1), RolePolicy::new(vec![RoutePattern::exact("/a")], "/a"))
            .role(Role(2), RolePolicy::new(vec![RoutePattern::exact("/b")], "/b"))
            .build();
        let both = RoleSet::from([Role(1), Role(2)]);
        assert!(can_access_route(&table, "/b", &both));
        assert!(can_access_route(&table, "/a", &both));
        assert!(!can_access_route(&table, "/b", &RoleSet::from([Role(1)])));
    }

    #[test]
    fn unknown_roles_deny() {
        let table = PolicyTable::standard();
        assert!(!can_access_route(&table, "/", &RoleSet::from([Role(99)])));
    }

    #[test]
    fn request_patterns() {
        let table = PolicyTable::standard();
        let member = RoleSet::from([Role::ER_MEMBER]);
        assert!(can_access_route(&table, "/request/42", &member));
        assert!(can_access_route(&table, "/request/42/action", &member));
        assert!(!can_access_route(&table, "/request/42/extra", &member));
    }

    #[test]
    fn smallest_role_wins_redirect() {
        let table = PolicyTable::builder()
            .role(Role(3), RolePolicy::new(vec![], "/three"))
            .role(Role(15), RolePolicy::new(vec![], "/fifteen"))
            .build();
        let forward: RoleSet = [Role(3), Role(15)].into_iter().collect();
        let reverse: RoleSet = [Role(15), Role(3)].into_iter().collect();
        assert_eq!(default_redirect(&table, &forward, "/login"), "/three");
        assert_eq!(default_redirect(&table, &reverse, "/login"), "/three");
    }

    #[test]
    fn no_roles_redirects_to_login() {
        let table = PolicyTable::standard();
        assert_eq!(default_redirect(&table, &RoleSet::new(), "/login"), "/login");
        assert_eq!(
            default_redirect(&table, &RoleSet::from([Role(1)]), "/login"),
            "/login"
        );
    }

    #[test]
    fn standard_redirects() {
        let table = PolicyTable::standard();
        let admin_and_member = RoleSet::from([Role::ER_MEMBER, Role::ADMIN]);
        assert_eq!(default_redirect(&table, &admin_and_member, "/login"), "/admin");
        assert_eq!(
            default_redirect(&table, &RoleSet::from([Role::ER_MEMBER]), "/login"),
            "/"
        );
    }
}
