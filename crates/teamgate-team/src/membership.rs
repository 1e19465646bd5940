//! Team membership management
//!
//! Creates, updates and removes per-tenant role assignments. Every operation
//! authorizes the actor first, then enforces the role hierarchy (an actor only
//! manages roles strictly below its own) and the rule that a tenant always
//! keeps at least one active Admin.
//!
//! The last-Admin rule is enforced through a per-tenant roster document in
//! `team_admin_rosters`. Taking an Admin out of service first removes its id
//! from the roster with a conditional update, so two concurrent removals
//! serialize on the roster's version and the second one sees the first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use teamgate_events::TeamEvent;
use teamgate_rbac::{Permission, Role};
use tracing::instrument;
use uuid::Uuid;

use crate::config::{ConfigError, TeamConfig};
use crate::engine::AuthorizationEngine;
use crate::error::{TeamError, TeamResult};
use crate::guard::{self, Claim};
use crate::model::{
    normalize_email, InvitationStatus, MemberUpdate, NewMember, RoleChangeOutcome, TeamInvitation,
    TeamMember,
};
use crate::notifier::{self, Notifier};
use crate::page::{decode_cursor, encode_cursor, Page, PageRequest};
use crate::store::{
    self, collections, Direction, Document, DocumentStore, Query, StartAfter, StoreError,
    Versioned,
};

/// Conflict reason for changes that would leave a tenant without an Admin.
pub const LAST_ADMIN: &str = "tenant must retain at least one Admin";

const ALREADY_MEMBER: &str = "user is already an active member of this tenant";

const CONCURRENT_UPDATE: &str = "concurrent update in progress, retry";

const ROSTER_ATTEMPTS: usize = 3;

/// Ids of a tenant's active Admins.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AdminRoster {
    member_ids: Vec<Uuid>,
    updated_at: DateTime<Utc>,
}

/// Manages tenant memberships.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use teamgate_rbac::{Role, RoleCatalog};
/// use teamgate_team::{
///     AuthorizationEngine, MemoryDocumentStore, NewMember, NoopNotifier, TeamConfig,
///     TeamMembershipManager,
/// };
/// use uuid::Uuid;
///
/// # async fn run() -> teamgate_team::TeamResult<()> {
/// let store = Arc::new(MemoryDocumentStore::new());
/// let engine = Arc::new(AuthorizationEngine::new(Arc::new(RoleCatalog::standard()), store.clone()));
/// let members = TeamMembershipManager::new(engine.clone(), store, Arc::new(NoopNotifier), TeamConfig::default())?;
///
/// let root = Uuid::now_v7();
/// engine.grant_global_role(root, Role::SuperAdmin).await?;
///
/// let tenant = Uuid::now_v7();
/// let admin = members
///     .create_member(root, tenant, NewMember::new(Uuid::now_v7(), "alice@example.com", Role::Admin))
///     .await?;
/// assert!(admin.is_active);
/// # Ok(())
/// # }
/// ```
pub struct TeamMembershipManager {
    engine: Arc<AuthorizationEngine>,
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    config: TeamConfig,
}

impl std::fmt::Debug for TeamMembershipManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamMembershipManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TeamMembershipManager {
    /// Build a manager, rejecting an invalid configuration.
    pub fn new(
        engine: Arc<AuthorizationEngine>,
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        config: TeamConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            engine,
            store,
            notifier,
            config,
        })
    }

    pub fn engine(&self) -> &Arc<AuthorizationEngine> {
        &self.engine
    }

    pub fn config(&self) -> &TeamConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Add a member directly.
    ///
    /// Requires `tenant:create_users` and authority over `new.role`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the actor lacks the permission or the authority
    /// - `InvalidArgument` for a malformed email or a global role
    /// - `Conflict` if the user is already an active member
    #[instrument(skip_all, fields(%actor_id, %tenant_id, user_id = %new.user_id))]
    pub async fn create_member(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        new: NewMember,
    ) -> TeamResult<TeamMember> {
        let actor_role = self
            .engine
            .authorize(actor_id, tenant_id, Permission::TenantCreateUsers)
            .await?;
        let email = normalize_email(&new.email)?;
        self.require_assignable(actor_role, new.role)?;

        let mut member = TeamMember::new(tenant_id, new.user_id, email, new.role, actor_id);
        member.display_name = clean_name(new.display_name);
        self.insert_member(member).await
    }

    /// Persist a new active membership without authorizing anyone.
    ///
    /// Shared by `create_member` and invitation acceptance.
    pub(crate) async fn insert_member(&self, member: TeamMember) -> TeamResult<TeamMember> {
        let doc = store::encode(&member)?;
        self.claim_active_slot(&member).await?;

        if let Err(e) = self
            .store
            .create(collections::MEMBERS, &member.id.to_string(), doc)
            .await
        {
            tracing::error!(member_id = %member.id, error = %e, "Failed to write team member");
            self.release_active_slot(&member).await;
            return Err(e.into());
        }
        if member.is_active_admin() {
            self.record_admin_seat(member.tenant_id, member.id).await;
        }

        tracing::info!(
            member_id = %member.id,
            tenant_id = %member.tenant_id,
            user_id = %member.user_id,
            role = %member.role,
            "Team member created"
        );
        notifier::dispatch(
            self.notifier(),
            TeamEvent::MemberCreated {
                member_id: member.id,
                tenant_id: member.tenant_id,
                user_id: member.user_id,
                role: member.role,
            },
        )
        .await;

        Ok(member)
    }

    /// Change a member's role, activity or display name.
    ///
    /// Requires `tenant:update_users` and authority over the member's current
    /// role; a role change also needs authority over the new role.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the actor lacks the permission or the authority
    /// - `NotFound` if the member is not in this tenant
    /// - `Conflict` if the tenant would lose its last active Admin, if
    ///   reactivation collides with another active membership, or if the
    ///   member changed concurrently
    #[instrument(skip_all, fields(%actor_id, %tenant_id, %member_id))]
    pub async fn update_member(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        member_id: Uuid,
        update: MemberUpdate,
    ) -> TeamResult<TeamMember> {
        let actor_role = self
            .engine
            .authorize(actor_id, tenant_id, Permission::TenantUpdateUsers)
            .await?;
        if update.is_empty() {
            return Err(TeamError::InvalidArgument("no changes requested".to_string()));
        }

        let Versioned {
            value: current,
            version,
        } = self.load_member(tenant_id, member_id).await?;
        self.require_manage(actor_role, current.role)?;
        if let Some(role) = update.role {
            self.require_assignable(actor_role, role)?;
        }

        let mut updated = current.clone();
        let mut changes = Vec::new();
        if let Some(role) = update.role.filter(|r| *r != current.role) {
            updated.role = role;
            changes.push("role".to_string());
        }
        if let Some(active) = update.is_active.filter(|a| *a != current.is_active) {
            updated.is_active = active;
            changes.push("is_active".to_string());
        }
        if let Some(name) = update.display_name {
            let name = clean_name(Some(name));
            if name != current.display_name {
                updated.display_name = name;
                changes.push("display_name".to_string());
            }
        }
        if changes.is_empty() {
            return Ok(current);
        }

        let losing_admin = current.is_active_admin() && !updated.is_active_admin();
        let gaining_admin = !current.is_active_admin() && updated.is_active_admin();
        if losing_admin {
            self.release_admin_seat(tenant_id, member_id).await?;
        }

        // A member that is losing its Admin seat is active, so never reactivating.
        let reactivating = !current.is_active && updated.is_active;
        if reactivating {
            self.claim_active_slot(&updated).await?;
        }

        updated.updated_at = Utc::now();
        let fields = json!({
            "role": updated.role,
            "is_active": updated.is_active,
            "display_name": updated.display_name,
            "updated_at": updated.updated_at,
        });
        if let Err(e) = self
            .store
            .conditional_update(collections::MEMBERS, &member_id.to_string(), fields, version)
            .await
        {
            if reactivating {
                self.release_active_slot(&updated).await;
            }
            if losing_admin {
                self.record_admin_seat(tenant_id, member_id).await;
            }
            return Err(member_write_error(e));
        }

        if current.is_active && !updated.is_active {
            self.release_active_slot(&updated).await;
        }
        if gaining_admin {
            self.record_admin_seat(tenant_id, member_id).await;
        }

        tracing::info!(?changes, role = %updated.role, is_active = updated.is_active, "Team member updated");
        notifier::dispatch(
            self.notifier(),
            TeamEvent::MemberUpdated {
                member_id,
                tenant_id,
                user_id: updated.user_id,
                role: updated.role,
                is_active: updated.is_active,
                changes,
            },
        )
        .await;

        Ok(updated)
    }

    /// Remove a membership.
    ///
    /// Requires `tenant:delete_users` and authority over the member's role.
    /// Returns the removed record.
    #[instrument(skip_all, fields(%actor_id, %tenant_id, %member_id))]
    pub async fn delete_member(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        member_id: Uuid,
    ) -> TeamResult<TeamMember> {
        let actor_role = self
            .engine
            .authorize(actor_id, tenant_id, Permission::TenantDeleteUsers)
            .await?;
        let Versioned {
            value: current,
            version,
        } = self.load_member(tenant_id, member_id).await?;
        self.require_manage(actor_role, current.role)?;

        if current.is_active_admin() {
            self.release_admin_seat(tenant_id, member_id).await?;
        }

        if let Err(e) = self
            .store
            .delete(collections::MEMBERS, &member_id.to_string(), Some(version))
            .await
        {
            if current.is_active_admin() {
                self.record_admin_seat(tenant_id, member_id).await;
            }
            return Err(member_write_error(e));
        }

        if current.is_active {
            self.release_active_slot(&current).await;
        }

        tracing::info!(user_id = %current.user_id, role = %current.role, "Team member removed");
        notifier::dispatch(
            self.notifier(),
            TeamEvent::MemberRemoved {
                member_id,
                tenant_id,
                user_id: current.user_id,
            },
        )
        .await;

        Ok(current)
    }

    /// Apply role changes one by one.
    ///
    /// The actor must hold `tenant:update_users` up front; after that each
    /// entry succeeds or fails on its own, with no cross-entry atomicity.
    #[instrument(skip_all, fields(%actor_id, %tenant_id, count = changes.len()))]
    pub async fn bulk_update_roles(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        changes: Vec<(Uuid, Role)>,
    ) -> TeamResult<Vec<RoleChangeOutcome>> {
        self.engine
            .authorize(actor_id, tenant_id, Permission::TenantUpdateUsers)
            .await?;

        let mut outcomes = Vec::with_capacity(changes.len());
        for (member_id, role) in changes {
            let result = self
                .update_member(actor_id, tenant_id, member_id, MemberUpdate::role(role))
                .await;
            outcomes.push(RoleChangeOutcome { member_id, result });
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if failed > 0 {
            tracing::warn!(failed, "Some role changes were rejected");
        }
        Ok(outcomes)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Fetch one member of the tenant. Requires `tenant:read_users`.
    pub async fn get_member(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        member_id: Uuid,
    ) -> TeamResult<TeamMember> {
        self.engine
            .authorize(actor_id, tenant_id, Permission::TenantReadUsers)
            .await?;
        Ok(self.load_member(tenant_id, member_id).await?.value)
    }

    /// List the tenant's members, oldest first. Requires `tenant:read_users`.
    ///
    /// Inactive members are skipped unless `include_inactive` is set.
    pub async fn list_members(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        page: PageRequest,
        include_inactive: bool,
    ) -> TeamResult<Page<TeamMember>> {
        self.engine
            .authorize(actor_id, tenant_id, Permission::TenantReadUsers)
            .await?;

        let mut query = Query::new().filter("tenant_id", tenant_id.to_string());
        if !include_inactive {
            query = query.filter("is_active", true);
        }
        self.paginate(collections::MEMBERS, query, "created_at", &page, |_: &TeamMember| true)
            .await
    }

    /// List the tenant's invitations, oldest first. Requires `tenant:read_users`.
    ///
    /// Statuses are reported as of now, so a lapsed `Pending` invitation is
    /// listed (and filtered) as `Expired`.
    pub async fn list_invitations(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        page: PageRequest,
        status: Option<InvitationStatus>,
    ) -> TeamResult<Page<TeamInvitation>> {
        self.engine
            .authorize(actor_id, tenant_id, Permission::TenantReadUsers)
            .await?;

        let now = Utc::now();
        let mut query = Query::new().filter("tenant_id", tenant_id.to_string());
        // Stored and effective status agree except for lapsed Pending records.
        if let Some(s) = status.filter(|s| *s != InvitationStatus::Expired) {
            query = query.filter("status", s.as_str());
        }

        let mut page = self
            .paginate(
                collections::INVITATIONS,
                query,
                "invited_at",
                &page,
                |inv: &TeamInvitation| status.map_or(true, |s| inv.effective_status(now) == s),
            )
            .await?;
        for invitation in &mut page.items {
            invitation.status = invitation.effective_status(now);
        }
        Ok(page)
    }

    /// Check whether the tenant has an active member with this email.
    pub(crate) async fn has_active_member_with_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> TeamResult<bool> {
        let query = Query::new()
            .filter("tenant_id", tenant_id.to_string())
            .filter("email", email)
            .filter("is_active", true)
            .limit(1);
        Ok(!self.store.query(collections::MEMBERS, &query).await?.is_empty())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn require_manage(&self, actor_role: Role, target: Role) -> TeamResult<()> {
        if self.engine.catalog().can_manage(actor_role, target) {
            Ok(())
        } else {
            Err(TeamError::Forbidden(format!(
                "role {actor_role} cannot manage role {target}"
            )))
        }
    }

    /// Check that `role` may be handed out through a membership by `actor_role`.
    pub(crate) fn require_assignable(&self, actor_role: Role, role: Role) -> TeamResult<()> {
        if self.engine.catalog().is_global(role) {
            return Err(TeamError::InvalidArgument(format!(
                "{role} cannot be held through a tenant membership"
            )));
        }
        self.require_manage(actor_role, role)
    }

    async fn load_member(&self, tenant_id: Uuid, member_id: Uuid) -> TeamResult<Versioned<TeamMember>> {
        store::load::<TeamMember>(self.store(), collections::MEMBERS, &member_id.to_string())
            .await?
            .filter(|m| m.value.tenant_id == tenant_id)
            .ok_or_else(|| TeamError::NotFound("team member not found".to_string()))
    }

    /// Load the tenant's Admin roster with its version.
    ///
    /// A tenant without a roster yet gets one seeded from its active Admin
    /// members, with no version.
    async fn admin_roster(&self, tenant_id: Uuid) -> TeamResult<(Vec<Uuid>, Option<u64>)> {
        let key = tenant_id.to_string();
        if let Some(roster) =
            store::load::<AdminRoster>(self.store(), collections::ADMIN_ROSTERS, &key).await?
        {
            return Ok((roster.value.member_ids, Some(roster.version)));
        }

        let query = Query::new()
            .filter("tenant_id", tenant_id.to_string())
            .filter("role", Role::Admin.as_str())
            .filter("is_active", true);
        let member_ids = self
            .store
            .query(collections::MEMBERS, &query)
            .await?
            .into_iter()
            .filter_map(|doc| doc.id.parse::<Uuid>().ok())
            .collect();
        Ok((member_ids, None))
    }

    /// Write the roster if it is still at `version`. `Ok(false)` means
    /// another writer got there first.
    async fn write_admin_roster(
        &self,
        tenant_id: Uuid,
        member_ids: Vec<Uuid>,
        version: Option<u64>,
    ) -> TeamResult<bool> {
        let key = tenant_id.to_string();
        let doc = store::encode(&AdminRoster {
            member_ids,
            updated_at: Utc::now(),
        })?;
        let written = match version {
            Some(v) => {
                self.store
                    .conditional_update(collections::ADMIN_ROSTERS, &key, doc, v)
                    .await
            }
            None => self.store.create(collections::ADMIN_ROSTERS, &key, doc).await,
        };

        match written {
            Ok(_) => Ok(true),
            Err(
                StoreError::VersionMismatch { .. }
                | StoreError::AlreadyExists { .. }
                | StoreError::NotFound { .. },
            ) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Take `member_id` off the Admin roster before it stops being an Admin.
    ///
    /// # Errors
    ///
    /// - `Conflict(LAST_ADMIN)` if no other Admin would remain
    /// - `Conflict` if another roster change raced this one
    async fn release_admin_seat(&self, tenant_id: Uuid, member_id: Uuid) -> TeamResult<()> {
        let (member_ids, version) = self.admin_roster(tenant_id).await?;
        let remaining: Vec<Uuid> = member_ids
            .iter()
            .copied()
            .filter(|id| *id != member_id)
            .collect();
        if remaining.is_empty() {
            return Err(TeamError::Conflict(LAST_ADMIN.to_string()));
        }
        if remaining.len() == member_ids.len() {
            return Ok(());
        }

        if self.write_admin_roster(tenant_id, remaining, version).await? {
            Ok(())
        } else {
            Err(TeamError::Conflict(CONCURRENT_UPDATE.to_string()))
        }
    }

    /// Put `member_id` on the Admin roster. Best effort.
    async fn record_admin_seat(&self, tenant_id: Uuid, member_id: Uuid) {
        for _ in 0..ROSTER_ATTEMPTS {
            let (mut member_ids, version) = match self.admin_roster(tenant_id).await {
                Ok(roster) => roster,
                Err(e) => {
                    tracing::warn!(%tenant_id, %member_id, error = %e, "Failed to read admin roster");
                    return;
                }
            };
            if member_ids.contains(&member_id) && version.is_some() {
                return;
            }
            if !member_ids.contains(&member_id) {
                member_ids.push(member_id);
            }

            match self.write_admin_roster(tenant_id, member_ids, version).await {
                Ok(true) => return,
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(%tenant_id, %member_id, error = %e, "Failed to record admin seat");
                    return;
                }
            }
        }
        tracing::warn!(%tenant_id, %member_id, "Admin roster contended, seat not recorded");
    }

    /// Take the `{tenant}:{user}` slot for this membership.
    async fn claim_active_slot(&self, member: &TeamMember) -> TeamResult<()> {
        let key = guard::key(member.tenant_id, &member.user_id.to_string());
        let claim = guard::claim(self.store(), collections::ACTIVE_MEMBERS, &key, member.id).await?;
        let (holder_id, guard_version) = match claim {
            Claim::Acquired(_) => return Ok(()),
            Claim::Held { target_id, .. } if target_id == member.id => return Ok(()),
            Claim::Held {
                target_id, version, ..
            } => (target_id, version),
        };

        let holder =
            store::load::<TeamMember>(self.store(), collections::MEMBERS, &holder_id.to_string())
                .await?;
        match holder {
            Some(h) if h.value.is_active => {
                return Err(TeamError::Conflict(ALREADY_MEMBER.to_string()))
            }
            Some(_) => {}
            // The holder's record may still be on its way.
            None if !claim.is_abandoned(Utc::now()) => {
                return Err(TeamError::Conflict(ALREADY_MEMBER.to_string()))
            }
            None => {
                tracing::warn!(%holder_id, "Taking over abandoned membership guard");
            }
        }

        guard::take_over(
            self.store(),
            collections::ACTIVE_MEMBERS,
            &key,
            member.id,
            guard_version,
        )
        .await?
        .map(|_| ())
        .ok_or_else(|| TeamError::Conflict(ALREADY_MEMBER.to_string()))
    }

    async fn release_active_slot(&self, member: &TeamMember) {
        let key = guard::key(member.tenant_id, &member.user_id.to_string());
        guard::release(self.store(), collections::ACTIVE_MEMBERS, &key, member.id).await;
    }

    /// Walk `collection` in `order_field` order until a page of `keep`-ing
    /// items is filled.
    async fn paginate<T, F>(
        &self,
        collection: &str,
        base: Query,
        order_field: &str,
        page: &PageRequest,
        keep: F,
    ) -> TeamResult<Page<T>>
    where
        T: DeserializeOwned + Send,
        F: Fn(&T) -> bool + Send,
    {
        let limit = self.config.page_size(page.limit);
        let batch_size = limit + 1;
        let mut start_after: Option<StartAfter> =
            page.cursor.as_deref().map(decode_cursor).transpose()?;
        let mut kept: Vec<(T, Document, String)> = Vec::new();

        'scan: loop {
            let mut query = base
                .clone()
                .order_by(order_field, Direction::Ascending)
                .limit(batch_size);
            query.start_after = start_after.take();

            let batch = self.store.query(collection, &query).await?;
            let exhausted = batch.len() < batch_size;

            for doc in batch {
                let key = doc.value.get(order_field).cloned().unwrap_or(Document::Null);
                let id = doc.id.clone();
                start_after = Some(StartAfter {
                    value: key.clone(),
                    id: id.clone(),
                });

                let item = store::decode::<T>(doc)?.value;
                if keep(&item) {
                    kept.push((item, key, id));
                    if kept.len() > limit {
                        break 'scan;
                    }
                }
            }

            if exhausted {
                break;
            }
        }

        let next_cursor = if kept.len() > limit {
            kept.truncate(limit);
            kept.last()
                .map(|(_, key, id)| encode_cursor(key.clone(), id))
                .transpose()?
        } else {
            None
        };

        Ok(Page {
            items: kept.into_iter().map(|(item, _, _)| item).collect(),
            next_cursor,
        })
    }
}

fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

fn member_write_error(err: StoreError) -> TeamError {
    match err {
        StoreError::VersionMismatch { .. } => {
            TeamError::Conflict("team member was modified concurrently".to_string())
        }
        StoreError::NotFound { .. } => TeamError::NotFound("team member not found".to_string()),
        other => other.into(),
    }
}
