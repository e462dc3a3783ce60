//! Permissions
//!
//! The one authoritative role to permission table. Permission names are
//! compared exactly; the only non-literal entry is the super admin wildcard.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::role::Role;

/// Grants every permission, present or future.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    #[display("view_products")]
    ViewProducts,
    #[display("purchase_products")]
    PurchaseProducts,
    #[display("manage_own_profile")]
    ManageOwnProfile,
    #[display("manage_own_api_keys")]
    ManageOwnApiKeys,
    #[display("moderate_content")]
    ModerateContent,
    #[display("view_users")]
    ViewUsers,
    #[display("manage_users")]
    ManageUsers,
    #[display("manage_products")]
    ManageProducts,
    #[display("manage_portfolio")]
    ManagePortfolio,
    #[display("view_analytics")]
    ViewAnalytics,
}

impl Permission {
    pub const ALL: [Permission; 10] = [
        Permission::ViewProducts,
        Permission::PurchaseProducts,
        Permission::ManageOwnProfile,
        Permission::ManageOwnApiKeys,
        Permission::ModerateContent,
        Permission::ViewUsers,
        Permission::ManageUsers,
        Permission::ManageProducts,
        Permission::ManagePortfolio,
        Permission::ViewAnalytics,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.to_string() == name)
    }
}

const USER: &[Permission] = &[
    Permission::ViewProducts,
    Permission::PurchaseProducts,
    Permission::ManageOwnProfile,
    Permission::ManageOwnApiKeys,
];

const MODERATOR: &[Permission] = &[Permission::ModerateContent, Permission::ViewUsers];

const ADMIN: &[Permission] = &[
    Permission::ManageUsers,
    Permission::ManageProducts,
    Permission::ManagePortfolio,
    Permission::ViewAnalytics,
];

/// Set of capability names, possibly the wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    wildcard: bool,
    names: BTreeSet<String>,
}

impl PermissionSet {
    pub fn wildcard() -> Self {
        Self {
            wildcard: true,
            names: BTreeSet::new(),
        }
    }

    /// Each role carries its own grants plus those of every lower role.
    pub fn for_role(role: Role) -> Self {
        let tiers: &[&[Permission]] = match role {
            Role::SuperAdmin => return Self::wildcard(),
            Role::Admin => &[USER, MODERATOR, ADMIN],
            Role::Moderator => &[USER, MODERATOR],
            Role::User => &[USER],
        };
        Self {
            wildcard: false,
            names: tiers
                .iter()
                .flat_map(|tier| tier.iter())
                .map(|p| p.to_string())
                .collect(),
        }
    }

    /// `"*"` anywhere in the input yields the wildcard set.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for name in names {
            let name = name.as_ref().trim();
            if name == WILDCARD {
                return Self::wildcard();
            }
            if !name.is_empty() {
                set.names.insert(name.to_string());
            }
        }
        set
    }

    #[inline]
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Exact match or wildcard. No prefix matching.
    pub fn contains(&self, name: &str) -> bool {
        self.wildcard || self.names.contains(name)
    }

    /// What both sets grant.
    pub fn intersect(&self, other: &PermissionSet) -> PermissionSet {
        match (self.wildcard, other.wildcard) {
            (true, _) => other.clone(),
            (_, true) => self.clone(),
            _ => PermissionSet {
                wildcard: false,
                names: self.names.intersection(&other.names).cloned().collect(),
            },
        }
    }

    /// Names for display and storage; the wildcard renders as `["*"]`.
    pub fn to_vec(&self) -> Vec<String> {
        if self.wildcard {
            vec![WILDCARD.to_string()]
        } else {
            self.names.iter().cloned().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_table() {
        let user = PermissionSet::for_role(Role::User);
        assert!(user.contains("view_products"));
        assert!(user.contains("manage_own_api_keys"));
        assert!(!user.contains("moderate_content"));

        let moderator = PermissionSet::for_role(Role::Moderator);
        assert!(moderator.contains("view_users"));
        assert!(moderator.contains("purchase_products"));
        assert!(!moderator.contains("manage_users"));

        let admin = PermissionSet::for_role(Role::Admin);
        assert!(admin.contains("manage_users"));
        assert!(admin.contains("moderate_content"));
        assert!(!admin.is_wildcard());
    }

    #[test]
    fn test_super_admin_wildcard() {
        let set = PermissionSet::for_role(Role::SuperAdmin);
        assert!(set.is_wildcard());
        assert!(set.contains("manage_users"));
        assert!(set.contains("anything_added_later"));
        assert_eq!(set.to_vec(), vec!["*".to_string()]);
    }

    #[test]
    fn test_no_prefix_matching() {
        let set = PermissionSet::from_names(["manage"]);
        assert!(!set.contains("manage_users"));
        let set = PermissionSet::from_names(["manage_users"]);
        assert!(!set.contains("manage"));
    }

    #[test]
    fn test_intersection() {
        let admin = PermissionSet::for_role(Role::Admin);
        let key = PermissionSet::from_names(["view_products", "manage_users", "not_real"]);
        let effective = admin.intersect(&key);
        assert_eq!(
            effective.to_vec(),
            vec!["manage_users".to_string(), "view_products".to_string()]
        );

        let inherit = PermissionSet::wildcard();
        assert_eq!(admin.intersect(&inherit), admin);
        assert_eq!(inherit.intersect(&admin), admin);
    }

    #[test]
    fn test_permission_names() {
        assert_eq!(Permission::ManageOwnApiKeys.to_string(), "manage_own_api_keys");
        assert_eq!(Permission::parse("view_analytics"), Some(Permission::ViewAnalytics));
        assert_eq!(Permission::parse("*"), None);
    }
}
