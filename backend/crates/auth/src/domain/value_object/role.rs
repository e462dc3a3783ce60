use serde::{Deserialize, Serialize};
use std::fmt;

use super::permission::PermissionSet;

/// Strict total order: `User < Moderator < Admin < SuperAdmin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum Role {
    #[default]
    User = 0,
    Moderator = 1,
    Admin = 2,
    SuperAdmin = 3,
}

impl Role {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        use Role::*;
        match self {
            User => "user",
            Moderator => "moderator",
            Admin => "admin",
            SuperAdmin => "super_admin",
        }
    }

    pub const fn from_id(id: i16) -> Option<Self> {
        use Role::*;
        match id {
            0 => Some(User),
            1 => Some(Moderator),
            2 => Some(Admin),
            3 => Some(SuperAdmin),
            _ => None,
        }
    }

    /// Accepts `superadmin` as an alias of `super_admin`.
    pub fn from_code(code: &str) -> Option<Self> {
        use Role::*;
        match code {
            "user" => Some(User),
            "moderator" => Some(Moderator),
            "admin" => Some(Admin),
            "super_admin" | "superadmin" => Some(SuperAdmin),
            _ => None,
        }
    }

    /// Rank comparison only; no other implication between roles.
    #[inline]
    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }

    #[inline]
    pub const fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    pub fn permissions(&self) -> PermissionSet {
        PermissionSet::for_role(*self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_id() {
        assert_eq!(Role::from_id(0), Some(Role::User));
        assert_eq!(Role::from_id(1), Some(Role::Moderator));
        assert_eq!(Role::from_id(2), Some(Role::Admin));
        assert_eq!(Role::from_id(3), Some(Role::SuperAdmin));
        assert_eq!(Role::from_id(4), None);
    }

    #[test]
    fn test_role_from_code() {
        assert_eq!(Role::from_code("moderator"), Some(Role::Moderator));
        assert_eq!(Role::from_code("superadmin"), Some(Role::SuperAdmin));
        assert_eq!(Role::from_code("root"), None);
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Admin.satisfies(Role::Moderator));
        assert!(!Role::User.satisfies(Role::Moderator));
        assert!(Role::Moderator.satisfies(Role::Moderator));
        assert!(Role::SuperAdmin.satisfies(Role::Admin));
        assert!(!Role::Admin.satisfies(Role::SuperAdmin));
    }

    #[test]
    fn test_role_serde_uses_codes() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"super_admin\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }
}
