//! Role definitions
//!
//! This module defines the roles a principal can hold. Hierarchy levels and
//! permission grants live in the [`RoleCatalog`](crate::RoleCatalog), not here,
//! so the role table stays a single injected value.

use serde::{Deserialize, Serialize};

/// A role held by a principal.
///
/// `SuperAdmin` is the only global role; it is granted outside any tenant.
/// Every other role is scoped to a single tenant through a team membership.
///
/// # Examples
///
/// ```
/// use teamgate_rbac::Role;
///
/// assert_eq!(Role::parse("tenant_admin"), Some(Role::Admin));
/// assert!(Role::SuperAdmin.is_global());
/// assert!(Role::Marketer.is_tenant_role());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Basic user with no tenant capabilities
    #[serde(rename = "user")]
    User,

    /// Read access to campaigns plus analytics and billing reporting
    #[serde(rename = "tenant_analyst")]
    Analyst,

    /// Runs campaigns, creatives and budgets
    #[serde(rename = "tenant_marketer")]
    Marketer,

    /// Manages the tenant's team and settings
    #[serde(rename = "tenant_admin")]
    Admin,

    /// Platform operator, independent of any tenant
    #[serde(rename = "superadmin")]
    SuperAdmin,
}

impl Role {
    /// Check if this is the global role.
    pub fn is_global(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    /// Check if this role is held through a tenant membership.
    ///
    /// `User` counts as a tenant role: it is a membership without capabilities.
    pub fn is_tenant_role(&self) -> bool {
        !self.is_global()
    }

    /// Parse role from its wire name.
    ///
    /// Accepts the stored names (`tenant_admin`) as well as the short forms
    /// (`admin`), case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use teamgate_rbac::Role;
    ///
    /// assert_eq!(Role::parse("MARKETER"), Some(Role::Marketer));
    /// assert_eq!(Role::parse("owner"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Self::User),
            "tenant_analyst" | "analyst" => Some(Self::Analyst),
            "tenant_marketer" | "marketer" => Some(Self::Marketer),
            "tenant_admin" | "admin" => Some(Self::Admin),
            "superadmin" | "super_admin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    /// Get the stored representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Analyst => "tenant_analyst",
            Self::Marketer => "tenant_marketer",
            Self::Admin => "tenant_admin",
            Self::SuperAdmin => "superadmin",
        }
    }

    /// Get a human-readable display name for the role.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Analyst => "Analyst",
            Self::Marketer => "Marketer",
            Self::Admin => "Admin",
            Self::SuperAdmin => "Super Admin",
        }
    }

    /// All roles, lowest first.
    pub fn all() -> &'static [Role] {
        &[
            Role::User,
            Role::Analyst,
            Role::Marketer,
            Role::Admin,
            Role::SuperAdmin,
        ]
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("tenant_admin"), Some(Role::Admin));
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse("tenant_analyst"), Some(Role::Analyst));
        assert_eq!(Role::parse("superadmin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse(" user "), Some(Role::User));
        assert_eq!(Role::parse("owner"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_role_wire_names_round_trip() {
        for role in Role::all() {
            assert_eq!(Role::parse(role.as_str()), Some(*role));
            let json = serde_json::to_string(role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }

    #[test]
    fn test_only_superadmin_is_global() {
        let globals: Vec<_> = Role::all().iter().filter(|r| r.is_global()).collect();
        assert_eq!(globals, vec![&Role::SuperAdmin]);
    }
}
