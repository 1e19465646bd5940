//! Invitation lifecycle
//!
//! `Pending -> Accepted | Expired | Revoked`, with every transition a
//! conditional update against the version that was read. Expiry is checked
//! lazily whenever an invitation is touched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use teamgate_auth::{InvitationToken, VerifiedPrincipal};
use teamgate_events::TeamEvent;
use teamgate_rbac::{Permission, Role};
use tracing::{instrument, Instrument};
use uuid::Uuid;

use crate::error::{TeamError, TeamResult};
use crate::guard::{self, Claim};
use crate::membership::TeamMembershipManager;
use crate::model::{normalize_email, InvitationStatus, IssuedInvitation, TeamInvitation, TeamMember};
use crate::notifier;
use crate::redact::redact_email;
use crate::store::{self, collections, StoreError, Versioned};

/// Conflict reason for a second accept of the same invitation.
pub const ALREADY_PROCESSED: &str = "already processed";

const INVITATION_NOT_FOUND: &str = "invitation not found";
const PENDING_EXISTS: &str = "a pending invitation already exists for this email";

/// Token hash -> invitation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenIndex {
    invitation_id: Uuid,
}

/// Issues, accepts and revokes invitations.
///
/// Shares the store, engine and notifier of the membership manager it wraps,
/// and creates memberships through it on acceptance.
#[derive(Debug, Clone)]
pub struct InvitationManager {
    members: Arc<TeamMembershipManager>,
}

impl InvitationManager {
    pub fn new(members: Arc<TeamMembershipManager>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &Arc<TeamMembershipManager> {
        &self.members
    }

    /// Invite an email address into a tenant with `role`.
    ///
    /// The returned token is the only copy of the plaintext; the store keeps
    /// its hash.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the actor lacks `tenant:create_users` or authority
    ///   over `role`
    /// - `InvalidArgument` for a malformed email or a global role
    /// - `Conflict` if the email already belongs to an active member or has
    ///   an open invitation
    #[instrument(skip_all, fields(%actor_id, %tenant_id, %role))]
    pub async fn invite(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        email: &str,
        role: Role,
        message: Option<String>,
    ) -> TeamResult<IssuedInvitation> {
        let actor_role = self
            .members
            .engine()
            .authorize(actor_id, tenant_id, Permission::TenantCreateUsers)
            .await?;
        let email = normalize_email(email)?;
        self.members.require_assignable(actor_role, role)?;

        if self
            .members
            .has_active_member_with_email(tenant_id, &email)
            .await?
        {
            return Err(TeamError::Conflict(
                "user is already a member of this tenant".to_string(),
            ));
        }

        let now = Utc::now();
        let expires_at = self
            .members
            .config()
            .invitation_ttl()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                TeamError::InvalidArgument("invitation lifetime out of range".to_string())
            })?;
        let token = InvitationToken::generate();
        let invitation = TeamInvitation {
            id: Uuid::now_v7(),
            tenant_id,
            email,
            role,
            invited_by: actor_id,
            invited_at: now,
            expires_at,
            status: InvitationStatus::Pending,
            token_hash: token.hash(),
            message: message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            accepted_by: None,
            accepted_at: None,
            updated_at: now,
        };
        let doc = store::encode(&invitation)?;
        let index = store::encode(&TokenIndex {
            invitation_id: invitation.id,
        })?;

        self.claim_pending_slot(&invitation).await?;

        let store = self.members.store();
        if let Err(e) = store
            .create(collections::INVITATION_TOKENS, &invitation.token_hash, index)
            .await
        {
            self.release_pending(&invitation).await;
            return Err(e.into());
        }
        if let Err(e) = store
            .create(collections::INVITATIONS, &invitation.id.to_string(), doc)
            .await
        {
            if let Err(cleanup) = store
                .delete(collections::INVITATION_TOKENS, &invitation.token_hash, None)
                .await
            {
                tracing::warn!(error = %cleanup, "Failed to remove orphaned token index");
            }
            self.release_pending(&invitation).await;
            return Err(e.into());
        }

        tracing::info!(
            invitation_id = %invitation.id,
            email = %redact_email(&invitation.email),
            expires_at = %invitation.expires_at,
            "Invitation created"
        );
        notifier::dispatch(
            self.members.notifier(),
            TeamEvent::InvitationCreated {
                invitation_id: invitation.id,
                tenant_id,
                email: invitation.email.clone(),
                role,
                invited_by: actor_id,
                expires_at: invitation.expires_at,
                message: invitation.message.clone(),
                token: token.clone(),
            },
        )
        .await;

        Ok(IssuedInvitation { invitation, token })
    }

    /// Accept an invitation as `principal`.
    ///
    /// Of any number of concurrent accepts of one token, exactly one creates a
    /// membership; the rest get `Conflict("already processed")`.
    ///
    /// Once the invitation is marked accepted, creating the membership runs
    /// on its own task. Dropping this future after that point (a deadline,
    /// a disconnected caller) does not strand the invitation half-accepted.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown token
    /// - `Expired` once `expires_at` has passed
    /// - `Conflict` if the invitation is no longer pending or the principal
    ///   is already an active member
    /// - `Forbidden` if the principal does not own the invited email
    #[instrument(skip_all, fields(principal_id = %principal.id))]
    pub async fn accept(&self, token: &str, principal: &VerifiedPrincipal) -> TeamResult<TeamMember> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TeamError::NotFound(INVITATION_NOT_FOUND.to_string()));
        }
        let token_hash = InvitationToken::hash_str(token);

        let store = self.members.store();
        let index = store::load::<TokenIndex>(store, collections::INVITATION_TOKENS, &token_hash)
            .await?
            .ok_or_else(|| TeamError::NotFound(INVITATION_NOT_FOUND.to_string()))?;
        let current = self
            .load_invitation(index.value.invitation_id)
            .await?
            .filter(|inv| inv.value.token_hash == token_hash)
            .ok_or_else(|| TeamError::NotFound(INVITATION_NOT_FOUND.to_string()))?;
        let invitation = &current.value;

        match invitation.status {
            InvitationStatus::Pending => {}
            InvitationStatus::Accepted => {
                return Err(TeamError::Conflict(ALREADY_PROCESSED.to_string()))
            }
            InvitationStatus::Revoked => {
                return Err(TeamError::Conflict("invitation was revoked".to_string()))
            }
            InvitationStatus::Expired => return Err(TeamError::Expired),
        }

        let now = Utc::now();
        if invitation.is_expired_at(now) {
            self.expire(&current).await;
            self.release_pending(invitation).await;
            return Err(TeamError::Expired);
        }

        if !principal.owns_email(&invitation.email) {
            tracing::warn!(
                invitation_id = %invitation.id,
                email = %redact_email(&principal.email),
                "Invitation accept by non-matching or unverified email"
            );
            return Err(TeamError::Forbidden(
                "invitation was issued to a different email address".to_string(),
            ));
        }

        if self
            .members
            .engine()
            .active_member(invitation.tenant_id, principal.id)
            .await?
            .is_some()
        {
            return Err(TeamError::Conflict(
                "already a member of this tenant".to_string(),
            ));
        }

        let fields = json!({
            "status": InvitationStatus::Accepted,
            "accepted_by": principal.id,
            "accepted_at": now,
            "updated_at": now,
        });
        let accepted_version = match store
            .conditional_update(
                collections::INVITATIONS,
                &invitation.id.to_string(),
                fields,
                current.version,
            )
            .await
        {
            Ok(version) => version,
            Err(StoreError::VersionMismatch { .. }) => {
                tracing::debug!(invitation_id = %invitation.id, "Lost accept race");
                return Err(TeamError::Conflict(ALREADY_PROCESSED.to_string()));
            }
            Err(StoreError::NotFound { .. }) => {
                return Err(TeamError::NotFound(INVITATION_NOT_FOUND.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let completion = {
            let manager = self.clone();
            let invitation = invitation.clone();
            let principal = principal.clone();
            tokio::spawn(
                async move {
                    manager
                        .complete_accept(&invitation, &principal, now, accepted_version)
                        .await
                }
                .in_current_span(),
            )
        };
        completion.await.map_err(|e| {
            tracing::error!(invitation_id = %invitation.id, error = %e, "Accept task failed");
            TeamError::Unavailable(format!("accept did not complete: {e}"))
        })?
    }

    /// Create the membership for an invitation already marked accepted at
    /// `accepted_version`, handing the invitation back to `Pending` if that
    /// fails.
    async fn complete_accept(
        &self,
        invitation: &TeamInvitation,
        principal: &VerifiedPrincipal,
        now: DateTime<Utc>,
        accepted_version: u64,
    ) -> TeamResult<TeamMember> {
        let store = self.members.store();
        let member = match self
            .members
            .insert_member(TeamMember::from_invitation(invitation, principal, now))
            .await
        {
            Ok(member) => member,
            Err(e) => {
                // Hand the invitation back so the invitee can retry.
                let fields = json!({
                    "status": InvitationStatus::Pending,
                    "accepted_by": null,
                    "accepted_at": null,
                    "updated_at": Utc::now(),
                });
                if let Err(rollback) = store
                    .conditional_update(
                        collections::INVITATIONS,
                        &invitation.id.to_string(),
                        fields,
                        accepted_version,
                    )
                    .await
                {
                    tracing::error!(
                        invitation_id = %invitation.id,
                        error = %rollback,
                        "Failed to roll back accepted invitation"
                    );
                }
                return Err(e);
            }
        };

        self.release_pending(invitation).await;

        tracing::info!(
            invitation_id = %invitation.id,
            tenant_id = %invitation.tenant_id,
            member_id = %member.id,
            role = %member.role,
            "Invitation accepted"
        );
        notifier::dispatch(
            self.members.notifier(),
            TeamEvent::InvitationAccepted {
                invitation_id: invitation.id,
                tenant_id: invitation.tenant_id,
                member_id: member.id,
                user_id: principal.id,
            },
        )
        .await;

        Ok(member)
    }

    /// Revoke a pending invitation.
    ///
    /// Requires `tenant:create_users` in the invitation's tenant.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown invitation
    /// - `Forbidden` if the actor lacks the permission
    /// - `Conflict("invitation is not pending (current status: ...)")` for
    ///   anything but an open invitation
    #[instrument(skip_all, fields(%actor_id, %invitation_id))]
    pub async fn revoke(&self, actor_id: Uuid, invitation_id: Uuid) -> TeamResult<TeamInvitation> {
        let current = self
            .load_invitation(invitation_id)
            .await?
            .ok_or_else(|| TeamError::NotFound(INVITATION_NOT_FOUND.to_string()))?;
        let tenant_id = current.value.tenant_id;
        self.members
            .engine()
            .authorize(actor_id, tenant_id, Permission::TenantCreateUsers)
            .await?;

        let now = Utc::now();
        if !current.value.is_open_at(now) {
            if current.value.status == InvitationStatus::Pending {
                self.expire(&current).await;
                self.release_pending(&current.value).await;
            }
            return Err(not_pending(current.value.effective_status(now)));
        }

        let fields = json!({
            "status": InvitationStatus::Revoked,
            "updated_at": now,
        });
        match self
            .members
            .store()
            .conditional_update(
                collections::INVITATIONS,
                &invitation_id.to_string(),
                fields,
                current.version,
            )
            .await
        {
            Ok(_) => {}
            Err(StoreError::VersionMismatch { .. }) => {
                let status = self
                    .load_invitation(invitation_id)
                    .await?
                    .map(|inv| inv.value.effective_status(Utc::now()));
                return Err(match status {
                    Some(InvitationStatus::Pending) => TeamError::Conflict(
                        "concurrent update in progress, retry".to_string(),
                    ),
                    Some(status) => not_pending(status),
                    None => TeamError::NotFound(INVITATION_NOT_FOUND.to_string()),
                });
            }
            Err(StoreError::NotFound { .. }) => {
                return Err(TeamError::NotFound(INVITATION_NOT_FOUND.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        self.release_pending(&current.value).await;

        tracing::info!(%tenant_id, "Invitation revoked");
        notifier::dispatch(
            self.members.notifier(),
            TeamEvent::InvitationRevoked {
                invitation_id,
                tenant_id,
                revoked_by: actor_id,
            },
        )
        .await;

        let mut revoked = current.value;
        revoked.status = InvitationStatus::Revoked;
        revoked.updated_at = now;
        Ok(revoked)
    }

    /// Fetch an invitation with its effective status.
    ///
    /// Requires `tenant:read_users` in the invitation's tenant.
    pub async fn get_invitation(&self, actor_id: Uuid, invitation_id: Uuid) -> TeamResult<TeamInvitation> {
        let Versioned {
            value: mut invitation,
            ..
        } = self
            .load_invitation(invitation_id)
            .await?
            .ok_or_else(|| TeamError::NotFound(INVITATION_NOT_FOUND.to_string()))?;
        self.members
            .engine()
            .authorize(actor_id, invitation.tenant_id, Permission::TenantReadUsers)
            .await?;

        invitation.status = invitation.effective_status(Utc::now());
        Ok(invitation)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn load_invitation(&self, invitation_id: Uuid) -> TeamResult<Option<Versioned<TeamInvitation>>> {
        Ok(store::load::<TeamInvitation>(
            self.members.store(),
            collections::INVITATIONS,
            &invitation_id.to_string(),
        )
        .await?)
    }

    /// Take the `{tenant}:{email}` slot, replacing a guard whose invitation
    /// is no longer open.
    async fn claim_pending_slot(&self, invitation: &TeamInvitation) -> TeamResult<()> {
        let store = self.members.store();
        let key = guard::key(invitation.tenant_id, &invitation.email);

        let claim = guard::claim(store, collections::PENDING_INVITATIONS, &key, invitation.id).await?;
        let (holder_id, guard_version) = match claim {
            Claim::Acquired(_) => return Ok(()),
            Claim::Held {
                target_id, version, ..
            } => (target_id, version),
        };

        let now = Utc::now();
        match self.load_invitation(holder_id).await? {
            Some(holder) if holder.value.is_open_at(now) => {
                return Err(TeamError::Conflict(PENDING_EXISTS.to_string()))
            }
            Some(holder) => {
                if holder.value.status == InvitationStatus::Pending {
                    self.expire(&holder).await;
                }
            }
            // Another invite claimed the slot and has not written its
            // invitation yet.
            None if !claim.is_abandoned(now) => {
                return Err(TeamError::Conflict(PENDING_EXISTS.to_string()))
            }
            None => {
                tracing::warn!(%holder_id, "Taking over abandoned invitation guard");
            }
        }

        guard::take_over(
            store,
            collections::PENDING_INVITATIONS,
            &key,
            invitation.id,
            guard_version,
        )
        .await?
        .map(|_| ())
        .ok_or_else(|| TeamError::Conflict(PENDING_EXISTS.to_string()))
    }

    async fn release_pending(&self, invitation: &TeamInvitation) {
        let key = guard::key(invitation.tenant_id, &invitation.email);
        guard::release(
            self.members.store(),
            collections::PENDING_INVITATIONS,
            &key,
            invitation.id,
        )
        .await;
    }

    /// Persist the lapse of a stored-`Pending` invitation. Best effort: a lost
    /// race means someone else already moved it on.
    async fn expire(&self, current: &Versioned<TeamInvitation>) {
        let invitation = &current.value;
        let fields = json!({
            "status": InvitationStatus::Expired,
            "updated_at": Utc::now(),
        });

        match self
            .members
            .store()
            .conditional_update(
                collections::INVITATIONS,
                &invitation.id.to_string(),
                fields,
                current.version,
            )
            .await
        {
            Ok(_) => {
                tracing::info!(invitation_id = %invitation.id, "Invitation expired");
                notifier::dispatch(
                    self.members.notifier(),
                    TeamEvent::InvitationExpired {
                        invitation_id: invitation.id,
                        tenant_id: invitation.tenant_id,
                    },
                )
                .await;
            }
            Err(StoreError::VersionMismatch { .. } | StoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::warn!(invitation_id = %invitation.id, error = %e, "Failed to mark invitation expired")
            }
        }
    }
}

fn not_pending(status: InvitationStatus) -> TeamError {
    TeamError::Conflict(format!(
        "invitation is not pending (current status: {status})"
    ))
}
