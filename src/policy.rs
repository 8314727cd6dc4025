//! Role → route policy table.

use std::collections::HashMap;

use crate::types::Role;

/// A route entry in a role's allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    /// Every route.
    Any,
    /// Exactly this path.
    Exact(String),
    /// A resource collection: `/base`, `/base/{id}` and `/base/{id}/action`,
    /// where `{id}` is any non-empty segment without a slash.
    Resource(String),
}

impl RoutePattern {
    #[must_use]
    pub fn exact(path: impl Into<String>) -> Self {
        Self::Exact(path.into())
    }

    #[must_use]
    pub fn resource(base: impl Into<String>) -> Self {
        Self::Resource(base.into())
    }

    /// Whether `path` is covered by this pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(p) => p == path,
            Self::Resource(base) => {
                if path == base {
                    return true;
                }
                let Some(rest) = path
                    .strip_prefix(base.as_str())
                    .and_then(|r| r.strip_prefix('/'))
                else {
                    return false;
                };
                match rest.split_once('/') {
                    None => !rest.is_empty(),
                    Some((id, tail)) => !id.is_empty() && tail == "action",
                }
            }
        }
    }
}

/// Allowed routes and landing page of one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    allowed: Vec<RoutePattern>,
    default_redirect: String,
}

impl RolePolicy {
    #[must_use]
    pub fn new(allowed: Vec<RoutePattern>, default_redirect: impl Into<String>) -> Self {
        Self {
            allowed,
            default_redirect: default_redirect.into(),
        }
    }

    #[must_use]
    pub fn allowed_routes(&self) -> &[RoutePattern] {
        &self.allowed
    }

    #[must_use]
    pub fn default_redirect(&self) -> &str {
        &self.default_redirect
    }

    #[must_use]
    pub fn allows(&self, path: &str) -> bool {
        self.allowed.iter().any(|p| p.matches(path))
    }
}

/// Lookup table from role to policy. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    policies: HashMap<Role, RolePolicy>,
}

impl PolicyTable {
    /// The portal's built-in table.
    #[must_use]
    pub fn standard() -> Self {
        let member_routes = || {
            vec![
                RoutePattern::exact("/"),
                RoutePattern::exact("/create-request"),
                RoutePattern::exact("/chat"),
                RoutePattern::exact("/profile"),
                RoutePattern::resource("/request"),
            ]
        };

        let mut er_admin = member_routes();
        er_admin.push(RoutePattern::exact("/admin"));

        Self::builder()
            .role(Role::ADMIN, RolePolicy::new(vec![RoutePattern::Any], "/admin"))
            .role(Role::ER_ADMIN, RolePolicy::new(er_admin, "/"))
            .role(Role::ER_MEMBER, RolePolicy::new(member_routes(), "/"))
            .role(
                Role::USER,
                RolePolicy::new(
                    vec![
                        RoutePattern::exact("/"),
                        RoutePattern::exact("/create-request"),
                        RoutePattern::exact("/my-requests"),
                        RoutePattern::exact("/profile"),
                        RoutePattern::resource("/request"),
                    ],
                    "/",
                ),
            )
            .build()
    }

    #[must_use]
    pub fn builder() -> PolicyTableBuilder {
        PolicyTableBuilder::default()
    }

    /// Policy of `role`; `None` for roles the table does not know.
    #[must_use]
    pub fn policy_for(&self, role: Role) -> Option<&RolePolicy> {
        self.policies.get(&role)
    }

    #[must_use]
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.policies.keys().copied()
    }
}

/// Builder for custom [`PolicyTable`]s.
#[derive(Debug, Default)]
pub struct PolicyTableBuilder {
    policies: HashMap<Role, RolePolicy>,
}

impl PolicyTableBuilder {
    /// Sets the policy of `role`, replacing any earlier one.
    #[must_use]
    pub fn role(mut self, role: Role, policy: RolePolicy) -> Self {
        self.policies.insert(role, policy);
        self
    }

    #[must_use]
    pub fn build(self) -> PolicyTable {
        PolicyTable {
            policies: self.policies,
        }
    }
}
