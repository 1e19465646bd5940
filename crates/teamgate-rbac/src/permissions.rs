//! # Permissions
//!
//! Fine-grained capabilities and the sets of them granted to roles.
//! A permission is written as `scope:capability`, e.g. `tenant:create_users`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single capability that can be granted to a role.
///
/// Permissions are grouped by scope:
/// - **platform**: Cross-tenant operations (SuperAdmin only)
/// - **tenant**: Team and tenant settings management
/// - **campaigns** / **creatives** / **budgets**: Marketing work
/// - **analytics** / **billing**: Reporting and invoices
///
/// # Example
///
/// ```
/// use teamgate_rbac::Permission;
///
/// let perm = Permission::TenantCreateUsers;
/// assert_eq!(perm.as_str(), "tenant:create_users");
/// assert_eq!(Permission::parse("tenant:create_users"), Some(perm));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    // Platform management
    #[serde(rename = "platform:read_all_tenants")]
    PlatformReadAllTenants,
    #[serde(rename = "platform:create_tenant")]
    PlatformCreateTenant,
    #[serde(rename = "platform:delete_tenant")]
    PlatformDeleteTenant,
    #[serde(rename = "platform:manage_global_settings")]
    PlatformManageGlobalSettings,
    #[serde(rename = "platform:view_global_analytics")]
    PlatformViewGlobalAnalytics,
    #[serde(rename = "platform:manage_global_billing")]
    PlatformManageGlobalBilling,

    // Tenant management
    #[serde(rename = "tenant:read_users")]
    TenantReadUsers,
    #[serde(rename = "tenant:create_users")]
    TenantCreateUsers,
    #[serde(rename = "tenant:update_users")]
    TenantUpdateUsers,
    #[serde(rename = "tenant:delete_users")]
    TenantDeleteUsers,
    #[serde(rename = "tenant:manage_roles")]
    TenantManageRoles,
    #[serde(rename = "tenant:view_tenant_settings")]
    TenantViewSettings,
    #[serde(rename = "tenant:update_tenant_settings")]
    TenantUpdateSettings,

    // Campaigns
    #[serde(rename = "campaigns:read")]
    CampaignsRead,
    #[serde(rename = "campaigns:create")]
    CampaignsCreate,
    #[serde(rename = "campaigns:update")]
    CampaignsUpdate,
    #[serde(rename = "campaigns:delete")]
    CampaignsDelete,
    #[serde(rename = "campaigns:launch")]
    CampaignsLaunch,
    #[serde(rename = "campaigns:pause")]
    CampaignsPause,

    // Creatives
    #[serde(rename = "creatives:read")]
    CreativesRead,
    #[serde(rename = "creatives:create")]
    CreativesCreate,
    #[serde(rename = "creatives:update")]
    CreativesUpdate,
    #[serde(rename = "creatives:delete")]
    CreativesDelete,
    #[serde(rename = "creatives:generate_ai")]
    CreativesGenerateAi,

    // Budgets
    #[serde(rename = "budgets:read")]
    BudgetsRead,
    #[serde(rename = "budgets:update")]
    BudgetsUpdate,
    #[serde(rename = "budgets:allocate")]
    BudgetsAllocate,

    // Analytics
    #[serde(rename = "analytics:read_campaign_data")]
    AnalyticsReadCampaignData,
    #[serde(rename = "analytics:read_performance_data")]
    AnalyticsReadPerformanceData,
    #[serde(rename = "analytics:export_reports")]
    AnalyticsExportReports,
    #[serde(rename = "analytics:create_custom_reports")]
    AnalyticsCreateCustomReports,

    // Billing
    #[serde(rename = "billing:read_invoices")]
    BillingReadInvoices,
    #[serde(rename = "billing:export_invoices")]
    BillingExportInvoices,
    #[serde(rename = "billing:view_usage_data")]
    BillingViewUsageData,
    #[serde(rename = "billing:generate_billing_reports")]
    BillingGenerateBillingReports,
}

impl Permission {
    /// Get the wire representation of the permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::PlatformReadAllTenants => "platform:read_all_tenants",
            Permission::PlatformCreateTenant => "platform:create_tenant",
            Permission::PlatformDeleteTenant => "platform:delete_tenant",
            Permission::PlatformManageGlobalSettings => "platform:manage_global_settings",
            Permission::PlatformViewGlobalAnalytics => "platform:view_global_analytics",
            Permission::PlatformManageGlobalBilling => "platform:manage_global_billing",
            Permission::TenantReadUsers => "tenant:read_users",
            Permission::TenantCreateUsers => "tenant:create_users",
            Permission::TenantUpdateUsers => "tenant:update_users",
            Permission::TenantDeleteUsers => "tenant:delete_users",
            Permission::TenantManageRoles => "tenant:manage_roles",
            Permission::TenantViewSettings => "tenant:view_tenant_settings",
            Permission::TenantUpdateSettings => "tenant:update_tenant_settings",
            Permission::CampaignsRead => "campaigns:read",
            Permission::CampaignsCreate => "campaigns:create",
            Permission::CampaignsUpdate => "campaigns:update",
            Permission::CampaignsDelete => "campaigns:delete",
            Permission::CampaignsLaunch => "campaigns:launch",
            Permission::CampaignsPause => "campaigns:pause",
            Permission::CreativesRead => "creatives:read",
            Permission::CreativesCreate => "creatives:create",
            Permission::CreativesUpdate => "creatives:update",
            Permission::CreativesDelete => "creatives:delete",
            Permission::CreativesGenerateAi => "creatives:generate_ai",
            Permission::BudgetsRead => "budgets:read",
            Permission::BudgetsUpdate => "budgets:update",
            Permission::BudgetsAllocate => "budgets:allocate",
            Permission::AnalyticsReadCampaignData => "analytics:read_campaign_data",
            Permission::AnalyticsReadPerformanceData => "analytics:read_performance_data",
            Permission::AnalyticsExportReports => "analytics:export_reports",
            Permission::AnalyticsCreateCustomReports => "analytics:create_custom_reports",
            Permission::BillingReadInvoices => "billing:read_invoices",
            Permission::BillingExportInvoices => "billing:export_invoices",
            Permission::BillingViewUsageData => "billing:view_usage_data",
            Permission::BillingGenerateBillingReports => "billing:generate_billing_reports",
        }
    }

    /// Parse a permission from its wire representation.
    ///
    /// Matching is exact apart from surrounding whitespace and ASCII case.
    ///
    /// # Returns
    ///
    /// `Some(Permission)` if valid, `None` otherwise
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all().iter().copied().find(|p| p.as_str() == wanted)
    }

    /// The scope prefix (`platform`, `tenant`, `campaigns`, ...).
    pub fn scope(&self) -> &'static str {
        self.as_str().split(':').next().unwrap_or_default()
    }

    /// Get all permissions.
    pub fn all() -> &'static [Permission] {
        &[
            Permission::PlatformReadAllTenants,
            Permission::PlatformCreateTenant,
            Permission::PlatformDeleteTenant,
            Permission::PlatformManageGlobalSettings,
            Permission::PlatformViewGlobalAnalytics,
            Permission::PlatformManageGlobalBilling,
            Permission::TenantReadUsers,
            Permission::TenantCreateUsers,
            Permission::TenantUpdateUsers,
            Permission::TenantDeleteUsers,
            Permission::TenantManageRoles,
            Permission::TenantViewSettings,
            Permission::TenantUpdateSettings,
            Permission::CampaignsRead,
            Permission::CampaignsCreate,
            Permission::CampaignsUpdate,
            Permission::CampaignsDelete,
            Permission::CampaignsLaunch,
            Permission::CampaignsPause,
            Permission::CreativesRead,
            Permission::CreativesCreate,
            Permission::CreativesUpdate,
            Permission::CreativesDelete,
            Permission::CreativesGenerateAi,
            Permission::BudgetsRead,
            Permission::BudgetsUpdate,
            Permission::BudgetsAllocate,
            Permission::AnalyticsReadCampaignData,
            Permission::AnalyticsReadPerformanceData,
            Permission::AnalyticsExportReports,
            Permission::AnalyticsCreateCustomReports,
            Permission::BillingReadInvoices,
            Permission::BillingExportInvoices,
            Permission::BillingViewUsageData,
            Permission::BillingGenerateBillingReports,
        ]
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of permissions granted to a role.
///
/// Ordered, so iteration and serialization are deterministic.
///
/// # Example
///
/// ```
/// use teamgate_rbac::{Permission, PermissionSet};
///
/// let mut set = PermissionSet::new();
/// set.add(Permission::CampaignsRead);
/// set.add(Permission::CampaignsCreate);
///
/// assert!(set.has(Permission::CampaignsRead));
/// assert_eq!(set.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    permissions: BTreeSet<Permission>,
}

impl PermissionSet {
    /// Create a new empty permission set.
    pub fn new() -> Self {
        Self {
            permissions: BTreeSet::new(),
        }
    }

    /// Add a permission to the set.
    pub fn add(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    /// Add multiple permissions to the set.
    pub fn add_all<I>(&mut self, permissions: I)
    where
        I: IntoIterator<Item = Permission>,
    {
        self.permissions.extend(permissions);
    }

    /// Check if the set contains a permission.
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Iterate the permissions in wire-name order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.permissions.iter().copied()
    }

    /// Get all permissions in the set.
    pub fn all(&self) -> Vec<Permission> {
        self.iter().collect()
    }

    /// Get the count of permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Check if this set contains all permissions from another set.
    pub fn contains_all(&self, other: &PermissionSet) -> bool {
        other.permissions.is_subset(&self.permissions)
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_round_trips_through_wire_name() {
        for perm in Permission::all() {
            assert_eq!(Permission::parse(perm.as_str()), Some(*perm));
        }
    }

    #[test]
    fn test_permission_parse_rejects_unknown() {
        assert_eq!(Permission::parse("tenant:eat_users"), None);
        assert_eq!(Permission::parse(""), None);
        assert_eq!(Permission::parse("campaigns"), None);
    }

    #[test]
    fn test_permission_parse_is_lenient_on_case_and_whitespace() {
        assert_eq!(
            Permission::parse("  Tenant:Create_Users "),
            Some(Permission::TenantCreateUsers)
        );
    }

    #[test]
    fn test_permission_serde_uses_wire_name() {
        let json = serde_json::to_string(&Permission::BudgetsAllocate).unwrap();
        assert_eq!(json, "\"budgets:allocate\"");

        let parsed: Permission = serde_json::from_str("\"billing:view_usage_data\"").unwrap();
        assert_eq!(parsed, Permission::BillingViewUsageData);
    }

    #[test]
    fn test_permission_scope() {
        assert_eq!(Permission::PlatformCreateTenant.scope(), "platform");
        assert_eq!(Permission::TenantManageRoles.scope(), "tenant");
        assert_eq!(Permission::CreativesGenerateAi.scope(), "creatives");
    }

    #[test]
    fn test_permission_set() {
        let mut set = PermissionSet::new();
        set.add(Permission::CampaignsRead);
        set.add(Permission::CampaignsRead);
        set.add(Permission::CreativesRead);

        assert_eq!(set.len(), 2);
        assert!(set.has(Permission::CampaignsRead));
        assert!(!set.has(Permission::CampaignsDelete));
    }

    #[test]
    fn test_permission_set_contains_all() {
        let big: PermissionSet = Permission::all().iter().copied().collect();
        let small: PermissionSet = [Permission::BudgetsRead, Permission::BudgetsUpdate]
            .into_iter()
            .collect();

        assert!(big.contains_all(&small));
        assert!(!small.contains_all(&big));
        assert!(small.contains_all(&PermissionSet::new()));
    }
}
