use std::collections::BTreeSet;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Portal role identifier.
///
/// Roles are plain integers assigned by the backend. A smaller identifier
/// means a higher priority when choosing a caller's landing page.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    From, Into,
)]
#[serde(transparent)]
pub struct Role(pub u32);

impl Role {
    pub const ADMIN: Role = Role(3);
    pub const ER_ADMIN: Role = Role(14);
    pub const ER_MEMBER: Role = Role(15);
    pub const USER: Role = Role(16);

    #[must_use]
    pub fn id(self) -> u32 {
        self.0
    }

    /// Name of a known role, `None` for identifiers the portal does not define.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::ADMIN => Some("admin"),
            Self::ER_ADMIN => Some("er_admin"),
            Self::ER_MEMBER => Some("er_member"),
            Self::USER => Some("user"),
            _ => None,
        }
    }

    /// Whether this role may open the admin screens.
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::ADMIN | Self::ER_ADMIN)
    }
}

/// Set of roles held by a caller.
///
/// Duplicates collapse and iteration is in ascending identifier order, so the
/// first role is always the highest-priority one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// The numerically smallest role, if any.
    #[must_use]
    pub fn highest_priority(&self) -> Option<Role> {
        self.0.first().copied()
    }

    /// Whether any held role may open the admin screens.
    #[must_use]
    pub fn has_admin(&self) -> bool {
        self.iter().any(Role::is_admin)
    }

    /// Builds a set from loosely typed JSON values (numbers or numeric strings).
    ///
    /// Entries that are not role identifiers are skipped.
    #[must_use]
    pub fn from_json_values(values: &[JsonValue]) -> Self {
        values.iter().filter_map(role_from_json).collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}

/// Parses a persisted role mapping into a typed set.
///
/// Accepts a JSON array (`[14, "15"]`) or a comma-separated list (`"14,15"`).
/// Unparsable entries are dropped with a warning; an empty or blank input
/// yields an empty set.
#[must_use]
pub fn parse_role_set(raw: &str) -> RoleSet {
    let raw = raw.trim();
    if raw.is_empty() {
        return RoleSet::new();
    }

    if raw.starts_with('[') {
        return match serde_json::from_str::<Vec<JsonValue>>(raw) {
            Ok(values) => {
                let dropped = values.iter().filter(|v| role_from_json(v).is_none()).count();
                if dropped > 0 {
                    tracing::warn!(raw = %raw, dropped, "Dropped non-numeric role identifiers");
                }
                RoleSet::from_json_values(&values)
            }
            Err(e) => {
                tracing::warn!(error = %e, raw = %raw, "Unparsable role array");
                RoleSet::new()
            }
        };
    }

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<u32>() {
            Ok(id) => Some(Role(id)),
            Err(_) => {
                tracing::warn!(entry = %s, "Dropped non-numeric role identifier");
                None
            }
        })
        .collect()
}

fn role_from_json(value: &JsonValue) -> Option<Role> {
    match value {
        JsonValue::Number(n) => n.as_u64().and_then(|id| u32::try_from(id).ok()).map(Role),
        JsonValue::String(s) => s.trim().parse::<u32>().ok().map(Role),
        _ => None,
    }
}

/// Backend user identifier (opaque string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Profile of the signed-in caller, as issued by the verification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserInfo {
    pub user_id: UserId,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Persisted separately under its own key; see [`parse_role_set`].
    #[serde(skip)]
    pub role_ids: RoleSet,
}

impl UserInfo {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        full_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            full_name: full_name.into(),
            email: email.into(),
            phone_number: None,
            role_ids: RoleSet::new(),
        }
    }

    #[must_use]
    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    #[must_use]
    pub fn with_roles(mut self, roles: RoleSet) -> Self {
        self.role_ids = roles;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_array() {
        let roles = parse_role_set("[14, 15]");
        assert_eq!(roles, RoleSet::from([Role::ER_ADMIN, Role::ER_MEMBER]));
    }

    #[test]
    fn parse_json_array_with_string_ids() {
        let roles = parse_role_set(r#"["3", 16]"#);
        assert_eq!(roles, RoleSet::from([Role::ADMIN, Role::USER]));
    }

    #[test]
    fn parse_comma_separated() {
        let roles = parse_role_set(" 15, 3 ,15");
        assert_eq!(roles.len(), 2);
        assert!(roles.contains(Role::ADMIN));
        assert!(roles.contains(Role::ER_MEMBER));
    }

    #[test]
    fn parse_single_value() {
        assert_eq!(parse_role_set("14"), RoleSet::from([Role::ER_ADMIN]));
    }

    #[test]
    fn parse_drops_garbage() {
        assert_eq!(parse_role_set("abc, 16"), RoleSet::from([Role::USER]));
        assert_eq!(parse_role_set("[null, true, -1]"), RoleSet::new());
        assert!(parse_role_set("[14,").is_empty());
    }

    #[test]
    fn parse_blank_is_empty() {
        assert!(parse_role_set("").is_empty());
        assert!(parse_role_set("   ").is_empty());
        assert!(parse_role_set("[]").is_empty());
    }

    #[test]
    fn highest_priority_is_smallest_id() {
        let roles = RoleSet::from([Role::ER_MEMBER, Role::ADMIN, Role::USER]);
        assert_eq!(roles.highest_priority(), Some(Role::ADMIN));
        assert_eq!(RoleSet::new().highest_priority(), None);
    }

    #[test]
    fn admin_roles() {
        assert!(RoleSet::from([Role::ER_ADMIN]).has_admin());
        assert!(!RoleSet::from([Role::ER_MEMBER, Role::USER]).has_admin());
    }

    #[test]
    fn user_info_omits_roles_from_json() {
        let info = UserInfo::new("42", "Ada Lovelace", "ada@example.com")
            .with_roles(RoleSet::from([Role::USER]));
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("role_ids").is_none());
        assert_eq!(json["user_id"], "42");
    }
}
