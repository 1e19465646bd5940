//! Authorization decisions
//!
//! The engine answers "may this principal exercise this permission in this
//! tenant?" from two sources: a global role grant, which applies in every
//! tenant, and otherwise the principal's active membership in the tenant.
//! Anything it cannot establish is denied.

use std::sync::Arc;

use chrono::Utc;
use teamgate_rbac::{Permission, Role, RoleCatalog};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{TeamError, TeamResult};
use crate::guard::{self, GuardRecord};
use crate::model::{Decision, GlobalRoleGrant, TeamMember};
use crate::store::{self, collections, DocumentStore, StoreError, Versioned};

/// Deny reason for principals with neither a global role nor a membership.
pub const REASON_NOT_A_MEMBER: &str = "not a member";

/// Deny reason when the lookup itself failed.
pub const REASON_LOOKUP_FAILED: &str = "authorization lookup failed";

/// Read-only permission checks over the role catalog and the membership store.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use teamgate_rbac::{Permission, Role, RoleCatalog};
/// use teamgate_team::{AuthorizationEngine, MemoryDocumentStore};
/// use uuid::Uuid;
///
/// # async fn run() -> teamgate_team::TeamResult<()> {
/// let engine = AuthorizationEngine::new(
///     Arc::new(RoleCatalog::standard()),
///     Arc::new(MemoryDocumentStore::new()),
/// );
///
/// let root = Uuid::now_v7();
/// engine.grant_global_role(root, Role::SuperAdmin).await?;
///
/// let decision = engine.check(root, Uuid::now_v7(), Permission::TenantDeleteUsers).await;
/// assert!(decision.allowed);
/// # Ok(())
/// # }
/// ```
pub struct AuthorizationEngine {
    catalog: Arc<RoleCatalog>,
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationEngine")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl AuthorizationEngine {
    pub fn new(catalog: Arc<RoleCatalog>, store: Arc<dyn DocumentStore>) -> Self {
        Self { catalog, store }
    }

    /// The role table decisions are made against.
    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    pub(crate) fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Decide whether `principal_id` holds `permission` in `tenant_id`.
    ///
    /// Never fails: a store error is a deny with reason
    /// `"authorization lookup failed"`.
    #[instrument(skip_all, fields(%principal_id, %tenant_id, permission = %permission))]
    pub async fn check(&self, principal_id: Uuid, tenant_id: Uuid, permission: Permission) -> Decision {
        match self.effective_role(principal_id, tenant_id).await {
            Ok(Some(role)) => self.decide(role, permission),
            Ok(None) => Decision::deny(REASON_NOT_A_MEMBER),
            Err(e) => {
                tracing::error!(error = %e, "Authorization lookup failed; denying");
                Decision::deny(REASON_LOOKUP_FAILED)
            }
        }
    }

    /// Require `permission` and return the actor's effective role.
    ///
    /// The managers use the returned role for hierarchy checks. A deny becomes
    /// `TeamError::Forbidden` carrying the decision's reason.
    pub async fn authorize(&self, actor_id: Uuid, tenant_id: Uuid, permission: Permission) -> TeamResult<Role> {
        let role = match self.effective_role(actor_id, tenant_id).await {
            Ok(Some(role)) => role,
            Ok(None) => return Err(TeamError::Forbidden(REASON_NOT_A_MEMBER.to_string())),
            Err(e) => {
                tracing::error!(%actor_id, %tenant_id, error = %e, "Authorization lookup failed; denying");
                return Err(TeamError::Forbidden(REASON_LOOKUP_FAILED.to_string()));
            }
        };

        let decision = self.decide(role, permission);
        if !decision.allowed {
            tracing::debug!(%actor_id, %tenant_id, %permission, reason = %decision.reason, "Denied");
            return Err(TeamError::Forbidden(decision.reason));
        }
        Ok(role)
    }

    fn decide(&self, role: Role, permission: Permission) -> Decision {
        if self.catalog.has_permission(role, permission) {
            Decision::allow(format!("granted by role {role}"))
        } else {
            Decision::deny(format!("role {role} lacks permission {permission}"))
        }
    }

    /// The role that governs `principal_id` in `tenant_id`: the global role if
    /// one is granted, otherwise the active membership's role.
    pub async fn effective_role(&self, principal_id: Uuid, tenant_id: Uuid) -> TeamResult<Option<Role>> {
        if let Some(role) = self.global_role(principal_id).await? {
            return Ok(Some(role));
        }
        Ok(self
            .active_member(tenant_id, principal_id)
            .await?
            .map(|member| member.value.role))
    }

    /// The global role granted to a principal, if any.
    pub async fn global_role(&self, principal_id: Uuid) -> TeamResult<Option<Role>> {
        let grant = store::load::<GlobalRoleGrant>(
            self.store(),
            collections::GLOBAL_ROLES,
            &principal_id.to_string(),
        )
        .await?;
        Ok(grant
            .map(|g| g.value.role)
            .filter(|role| self.catalog.is_global(*role)))
    }

    /// Grant a global role.
    ///
    /// Operator surface: no authorization of its own. Only global roles are
    /// accepted.
    #[instrument(skip(self))]
    pub async fn grant_global_role(&self, principal_id: Uuid, role: Role) -> TeamResult<GlobalRoleGrant> {
        if !self.catalog.is_global(role) {
            return Err(TeamError::InvalidArgument(format!(
                "{role} is a tenant role and cannot be granted globally"
            )));
        }

        let grant = GlobalRoleGrant {
            principal_id,
            role,
            granted_at: Utc::now(),
        };
        self.store
            .set(
                collections::GLOBAL_ROLES,
                &principal_id.to_string(),
                store::encode(&grant)?,
            )
            .await?;

        tracing::info!("Global role granted");
        Ok(grant)
    }

    /// Revoke a principal's global role. Returns whether one was held.
    #[instrument(skip(self))]
    pub async fn revoke_global_role(&self, principal_id: Uuid) -> TeamResult<bool> {
        match self
            .store
            .delete(collections::GLOBAL_ROLES, &principal_id.to_string(), None)
            .await
        {
            Ok(()) => {
                tracing::info!("Global role revoked");
                Ok(true)
            }
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// The principal's active membership in a tenant, with its version.
    ///
    /// Resolved through the `{tenant}:{user}` guard; a guard pointing at a
    /// record that is gone or inactive reads as no membership.
    pub(crate) async fn active_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> TeamResult<Option<Versioned<TeamMember>>> {
        let key = guard::key(tenant_id, &user_id.to_string());
        let Some(held) =
            store::load::<GuardRecord>(self.store(), collections::ACTIVE_MEMBERS, &key).await?
        else {
            return Ok(None);
        };

        let member = store::load::<TeamMember>(
            self.store(),
            collections::MEMBERS,
            &held.value.target_id.to_string(),
        )
        .await?;

        Ok(member.filter(|m| {
            m.value.is_active && m.value.tenant_id == tenant_id && m.value.user_id == user_id
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentStore;

    fn engine() -> (AuthorizationEngine, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        let engine = AuthorizationEngine::new(Arc::new(RoleCatalog::standard()), store.clone());
        (engine, store)
    }

    #[tokio::test]
    async fn test_superadmin_allowed_everywhere() {
        let (engine, _) = engine();
        let root = Uuid::now_v7();
        engine.grant_global_role(root, Role::SuperAdmin).await.unwrap();

        for perm in Permission::all() {
            let decision = engine.check(root, Uuid::now_v7(), *perm).await;
            assert!(decision.allowed, "{perm}");
        }
        assert_eq!(
            engine.authorize(root, Uuid::now_v7(), Permission::PlatformCreateTenant).await.unwrap(),
            Role::SuperAdmin
        );
    }

    #[tokio::test]
    async fn test_non_member_denied() {
        let (engine, _) = engine();
        let decision = engine
            .check(Uuid::now_v7(), Uuid::now_v7(), Permission::CampaignsRead)
            .await;
        assert_eq!(decision, Decision::deny("not a member"));
    }

    #[tokio::test]
    async fn test_tenant_role_cannot_be_granted_globally() {
        let (engine, _) = engine();
        let result = engine.grant_global_role(Uuid::now_v7(), Role::Admin).await;
        assert!(matches!(result, Err(TeamError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_revoke_global_role() {
        let (engine, _) = engine();
        let root = Uuid::now_v7();
        engine.grant_global_role(root, Role::SuperAdmin).await.unwrap();

        assert!(engine.revoke_global_role(root).await.unwrap());
        assert!(!engine.revoke_global_role(root).await.unwrap());
        assert!(!engine.check(root, Uuid::now_v7(), Permission::CampaignsRead).await.allowed);
    }

    #[tokio::test]
    async fn test_store_failure_denies() {
        let (engine, store) = engine();
        let root = Uuid::now_v7();
        engine.grant_global_role(root, Role::SuperAdmin).await.unwrap();

        store.set_unavailable(true);
        let decision = engine.check(root, Uuid::now_v7(), Permission::CampaignsRead).await;
        assert_eq!(decision, Decision::deny("authorization lookup failed"));

        let result = engine.authorize(root, Uuid::now_v7(), Permission::CampaignsRead).await;
        assert!(matches!(result, Err(TeamError::Forbidden(ref r)) if r == "authorization lookup failed"));
    }

    #[tokio::test]
    async fn test_member_lookup_through_guard() {
        let (engine, store) = engine();
        let tenant = Uuid::now_v7();
        let user = Uuid::now_v7();
        let member = TeamMember::new(tenant, user, "m@example.com", Role::Marketer, Uuid::now_v7());

        store
            .create(collections::MEMBERS, &member.id.to_string(), store::encode(&member).unwrap())
            .await
            .unwrap();
        guard::claim(store.as_ref(), collections::ACTIVE_MEMBERS, &guard::key(tenant, &user.to_string()), member.id)
            .await
            .unwrap();

        let decision = engine.check(user, tenant, Permission::CampaignsLaunch).await;
        assert!(decision.allowed);
        assert_eq!(decision.reason, "granted by role tenant_marketer");

        let decision = engine.check(user, tenant, Permission::TenantCreateUsers).await;
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason,
            "role tenant_marketer lacks permission tenant:create_users"
        );

        // Membership in one tenant grants nothing in another.
        let elsewhere = engine.check(user, Uuid::now_v7(), Permission::CampaignsRead).await;
        assert_eq!(elsewhere.reason, "not a member");
    }
}
