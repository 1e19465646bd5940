//! # Role Catalog
//!
//! The immutable role table: which permissions each role grants and where each
//! role sits in the management hierarchy. Built once at startup and shared by
//! reference; nothing mutates it afterwards.

use std::collections::BTreeMap;

use crate::permissions::{Permission, PermissionSet};
use crate::role::Role;

#[derive(Debug, Clone)]
struct RoleEntry {
    level: u8,
    permissions: PermissionSet,
}

/// Immutable mapping from roles to permission sets and hierarchy levels.
///
/// Lookups for a role that is not in the table never fail: the role grants the
/// empty set and has no level, so `can_manage` is false in both directions.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use teamgate_rbac::{Permission, Role, RoleCatalog};
///
/// let catalog = Arc::new(RoleCatalog::standard());
/// assert_eq!(catalog.level(Role::Admin), Some(3));
/// assert!(catalog.has_permission(Role::Marketer, Permission::CampaignsLaunch));
/// ```
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    entries: BTreeMap<Role, RoleEntry>,
}

impl RoleCatalog {
    /// Start building a custom catalog.
    pub fn builder() -> RoleCatalogBuilder {
        RoleCatalogBuilder::default()
    }

    /// The production role table.
    ///
    /// | role | level | grants |
    /// |---|---|---|
    /// | `superadmin` | 10 | every permission |
    /// | `tenant_admin` | 3 | all tenant, campaign, creative, budget, analytics and billing permissions |
    /// | `tenant_marketer` | 2 | campaigns, creatives, budgets, analytics reads |
    /// | `tenant_analyst` | 1 | campaign/creative reads, analytics, billing |
    /// | `user` | 0 | nothing |
    pub fn standard() -> Self {
        use Permission::*;

        let admin = Permission::all()
            .iter()
            .copied()
            .filter(|p| p.scope() != "platform");

        Self::builder()
            .role(Role::SuperAdmin, 10, Permission::all().iter().copied())
            .role(Role::Admin, 3, admin)
            .role(
                Role::Marketer,
                2,
                [
                    CampaignsRead,
                    CampaignsCreate,
                    CampaignsUpdate,
                    CampaignsDelete,
                    CampaignsLaunch,
                    CampaignsPause,
                    CreativesRead,
                    CreativesCreate,
                    CreativesUpdate,
                    CreativesDelete,
                    CreativesGenerateAi,
                    BudgetsRead,
                    BudgetsUpdate,
                    BudgetsAllocate,
                    AnalyticsReadCampaignData,
                    AnalyticsReadPerformanceData,
                ],
            )
            .role(
                Role::Analyst,
                1,
                [
                    CampaignsRead,
                    CreativesRead,
                    AnalyticsReadCampaignData,
                    AnalyticsReadPerformanceData,
                    AnalyticsExportReports,
                    AnalyticsCreateCustomReports,
                    BillingReadInvoices,
                    BillingExportInvoices,
                    BillingViewUsageData,
                    BillingGenerateBillingReports,
                ],
            )
            .role(Role::User, 0, [])
            .build()
    }

    /// Permissions granted by a role; empty for roles not in the table.
    pub fn permissions_of(&self, role: Role) -> PermissionSet {
        self.entries
            .get(&role)
            .map(|entry| entry.permissions.clone())
            .unwrap_or_default()
    }

    /// Check whether a role grants a permission.
    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.entries
            .get(&role)
            .is_some_and(|entry| entry.permissions.has(permission))
    }

    /// Hierarchy level of a role, if the role is in the table.
    pub fn level(&self, role: Role) -> Option<u8> {
        self.entries.get(&role).map(|entry| entry.level)
    }

    /// Check whether a role is global (not scoped to a tenant).
    pub fn is_global(&self, role: Role) -> bool {
        role.is_global()
    }

    /// Check whether `manager` may assign, change or remove `target`.
    ///
    /// True only when both roles are known and the manager sits strictly higher.
    pub fn can_manage(&self, manager: Role, target: Role) -> bool {
        match (self.level(manager), self.level(target)) {
            (Some(m), Some(t)) => m > t,
            _ => false,
        }
    }

    /// Roles present in the table, lowest level first.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles: Vec<(u8, Role)> = self
            .entries
            .iter()
            .map(|(role, entry)| (entry.level, *role))
            .collect();
        roles.sort();
        roles.into_iter().map(|(_, role)| role).collect()
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builder for [`RoleCatalog`].
#[derive(Debug, Default)]
pub struct RoleCatalogBuilder {
    entries: BTreeMap<Role, RoleEntry>,
}

impl RoleCatalogBuilder {
    /// Register a role with its level and granted permissions.
    ///
    /// Registering the same role twice replaces the earlier entry.
    pub fn role<I>(mut self, role: Role, level: u8, permissions: I) -> Self
    where
        I: IntoIterator<Item = Permission>,
    {
        self.entries.insert(
            role,
            RoleEntry {
                level,
                permissions: permissions.into_iter().collect(),
            },
        );
        self
    }

    /// Freeze the table.
    pub fn build(self) -> RoleCatalog {
        RoleCatalog {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_levels() {
        let catalog = RoleCatalog::standard();
        assert_eq!(catalog.level(Role::User), Some(0));
        assert_eq!(catalog.level(Role::Analyst), Some(1));
        assert_eq!(catalog.level(Role::Marketer), Some(2));
        assert_eq!(catalog.level(Role::Admin), Some(3));
        assert_eq!(catalog.level(Role::SuperAdmin), Some(10));
        assert_eq!(
            catalog.roles(),
            vec![
                Role::User,
                Role::Analyst,
                Role::Marketer,
                Role::Admin,
                Role::SuperAdmin
            ]
        );
    }

    #[test]
    fn test_superadmin_holds_every_permission() {
        let catalog = RoleCatalog::standard();
        for perm in Permission::all() {
            assert!(catalog.has_permission(Role::SuperAdmin, *perm), "{perm}");
        }
    }

    #[test]
    fn test_admin_has_no_platform_permissions() {
        let catalog = RoleCatalog::standard();
        assert!(catalog.has_permission(Role::Admin, Permission::TenantCreateUsers));
        assert!(catalog.has_permission(Role::Admin, Permission::BillingExportInvoices));
        assert!(!catalog.has_permission(Role::Admin, Permission::PlatformCreateTenant));
    }

    #[test]
    fn test_marketer_and_analyst_tables() {
        let catalog = RoleCatalog::standard();

        assert_eq!(catalog.permissions_of(Role::Marketer).len(), 16);
        assert!(catalog.has_permission(Role::Marketer, Permission::CreativesGenerateAi));
        assert!(!catalog.has_permission(Role::Marketer, Permission::TenantCreateUsers));
        assert!(!catalog.has_permission(Role::Marketer, Permission::BillingReadInvoices));

        assert_eq!(catalog.permissions_of(Role::Analyst).len(), 10);
        assert!(catalog.has_permission(Role::Analyst, Permission::BillingViewUsageData));
        assert!(!catalog.has_permission(Role::Analyst, Permission::CampaignsCreate));

        assert!(catalog.permissions_of(Role::User).is_empty());
    }

    #[test]
    fn test_has_permission_matches_table() {
        let catalog = RoleCatalog::standard();
        for role in Role::all() {
            let granted = catalog.permissions_of(*role);
            for perm in Permission::all() {
                assert_eq!(catalog.has_permission(*role, *perm), granted.has(*perm));
                // deterministic
                assert_eq!(
                    catalog.has_permission(*role, *perm),
                    catalog.has_permission(*role, *perm)
                );
            }
        }
    }

    #[test]
    fn test_missing_role_is_default_deny() {
        let catalog = RoleCatalog::builder()
            .role(Role::Admin, 3, [Permission::TenantCreateUsers])
            .build();

        assert!(catalog.permissions_of(Role::Marketer).is_empty());
        assert_eq!(catalog.level(Role::Marketer), None);
        for perm in Permission::all() {
            assert!(!catalog.has_permission(Role::Marketer, *perm));
        }
        assert!(!catalog.can_manage(Role::Admin, Role::Marketer));
        assert!(!catalog.can_manage(Role::Marketer, Role::Admin));
    }

    #[test]
    fn test_can_manage_is_irreflexive() {
        let catalog = RoleCatalog::standard();
        for role in Role::all() {
            assert!(!catalog.can_manage(*role, *role));
        }
    }

    #[test]
    fn test_can_manage_is_transitive_and_follows_levels() {
        let catalog = RoleCatalog::standard();
        let roles = Role::all();
        for a in roles {
            for b in roles {
                assert_eq!(
                    catalog.can_manage(*a, *b),
                    catalog.level(*a) > catalog.level(*b)
                );
                for c in roles {
                    if catalog.can_manage(*a, *b) && catalog.can_manage(*b, *c) {
                        assert!(catalog.can_manage(*a, *c), "{a} > {b} > {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_builder_replaces_duplicate_role() {
        let catalog = RoleCatalog::builder()
            .role(Role::Analyst, 1, [Permission::CampaignsRead])
            .role(Role::Analyst, 4, [])
            .build();
        assert_eq!(catalog.level(Role::Analyst), Some(4));
        assert!(!catalog.has_permission(Role::Analyst, Permission::CampaignsRead));
    }
}
