//! Team domain models
//!
//! Memberships link a principal to a tenant with a role; invitations are the
//! single-use offers that turn into memberships when accepted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teamgate_auth::{InvitationToken, VerifiedPrincipal};
use teamgate_rbac::Role;
use uuid::Uuid;

use crate::error::{TeamError, TeamResult};

/// A principal's role assignment within one tenant.
///
/// At most one active membership exists per `(tenant_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    /// Unique membership ID
    pub id: Uuid,

    /// Principal holding the membership
    pub user_id: Uuid,

    /// Tenant the membership belongs to
    pub tenant_id: Uuid,

    /// Email address (lower-cased)
    pub email: String,

    /// Display name within the tenant
    #[serde(default)]
    pub display_name: Option<String>,

    /// Role within the tenant
    pub role: Role,

    /// Whether the membership is active
    pub is_active: bool,

    /// Who added or invited this principal
    pub invited_by: Uuid,

    /// When the principal was added or invited
    pub invited_at: DateTime<Utc>,

    /// When the principal accepted an invitation
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamMember {
    /// Create an active membership added directly by `invited_by`.
    pub fn new(
        tenant_id: Uuid,
        user_id: Uuid,
        email: impl Into<String>,
        role: Role,
        invited_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            tenant_id,
            email: email.into(),
            display_name: None,
            role,
            is_active: true,
            invited_by,
            invited_at: now,
            joined_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create the membership produced by accepting an invitation.
    pub fn from_invitation(
        invitation: &TeamInvitation,
        principal: &VerifiedPrincipal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: principal.id,
            tenant_id: invitation.tenant_id,
            email: invitation.email.clone(),
            display_name: principal.display_name.clone(),
            role: invitation.role,
            is_active: true,
            invited_by: invitation.invited_by,
            invited_at: invitation.invited_at,
            joined_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Check whether this is an active Admin membership.
    pub fn is_active_admin(&self) -> bool {
        self.is_active && self.role == Role::Admin
    }
}

/// Invitation lifecycle states.
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

impl InvitationStatus {
    /// Get the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    /// Parse from the stored representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "expired" => Some(Self::Expired),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }

    /// Check if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-use offer of a tenant role to an email address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamInvitation {
    pub id: Uuid,
    pub tenant_id: Uuid,

    /// Invitee email (lower-cased)
    pub email: String,

    /// Role granted on acceptance
    pub role: Role,

    pub invited_by: Uuid,
    pub invited_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    /// Stored status; see [`effective_status`](Self::effective_status)
    pub status: InvitationStatus,

    /// SHA-256 of the accept token
    pub token_hash: String,

    /// Optional note from the inviter
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub accepted_by: Option<Uuid>,
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,
}

impl TeamInvitation {
    /// Check whether the invitation is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The status a reader should see at `now`.
    ///
    /// A stored `Pending` past its expiry reads as `Expired`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        match self.status {
            InvitationStatus::Pending if self.is_expired_at(now) => InvitationStatus::Expired,
            status => status,
        }
    }

    /// Check whether the invitation can still be accepted or revoked at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == InvitationStatus::Pending
    }
}

/// An invitation together with its plaintext token.
///
/// Returned once from `invite`; the token is not recoverable afterwards.
#[derive(Debug, Clone)]
pub struct IssuedInvitation {
    pub invitation: TeamInvitation,
    pub token: InvitationToken,
}

/// Request to add a member directly.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub display_name: Option<String>,
}

impl NewMember {
    pub fn new(user_id: Uuid, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            email: email.into(),
            role,
            display_name: None,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Partial update of a membership. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberUpdate {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub display_name: Option<String>,
}

impl MemberUpdate {
    /// Change only the role.
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }

    /// Change only the activity flag.
    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Check whether the update requests no change at all.
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.is_active.is_none() && self.display_name.is_none()
    }
}

/// A global role held outside any tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRoleGrant {
    pub principal_id: Uuid,
    pub role: Role,
    pub granted_at: DateTime<Utc>,
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
}

impl Decision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Per-entry result of a bulk role update.
#[derive(Debug)]
pub struct RoleChangeOutcome {
    pub member_id: Uuid,
    pub result: TeamResult<TeamMember>,
}

/// Normalize and validate an email address.
///
/// Trims, lower-cases, and checks for a plausible `local@domain.tld` shape.
///
/// # Examples
///
/// ```
/// use teamgate_team::model::normalize_email;
///
/// assert_eq!(normalize_email("  Bob@Example.COM ").unwrap(), "bob@example.com");
/// assert!(normalize_email("not-an-email").is_err());
/// ```
pub fn normalize_email(raw: &str) -> TeamResult<String> {
    let email = raw.trim().to_lowercase();
    let invalid = || TeamError::InvalidArgument(format!("invalid email address: {:?}", raw.trim()));

    if email.is_empty() || email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }

    Ok(email)
}

/// Parse a role wire name, rejecting unknown names.
///
/// ```
/// use teamgate_rbac::Role;
/// use teamgate_team::model::parse_role;
///
/// assert_eq!(parse_role("tenant_marketer").unwrap(), Role::Marketer);
/// assert!(parse_role("owner").is_err());
/// ```
pub fn parse_role(raw: &str) -> TeamResult<Role> {
    Role::parse(raw).ok_or_else(|| TeamError::InvalidArgument(format!("unknown role: {:?}", raw.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(expires_in: Duration) -> TeamInvitation {
        let now = Utc::now();
        TeamInvitation {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            email: "bob@example.com".to_string(),
            role: Role::Marketer,
            invited_by: Uuid::now_v7(),
            invited_at: now,
            expires_at: now + expires_in,
            status: InvitationStatus::Pending,
            token_hash: InvitationToken::hash_str("tok"),
            message: None,
            accepted_by: None,
            accepted_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("Bob@Example.com").unwrap(), "bob@example.com");
        assert_eq!(normalize_email(" a.b+c@x.co.uk ").unwrap(), "a.b+c@x.co.uk");

        for bad in ["", "bob", "@example.com", "bob@", "bob@example", "bob@@example.com", "b ob@x.com", "bob@x..com"] {
            assert!(
                matches!(normalize_email(bad), Err(TeamError::InvalidArgument(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_effective_status() {
        let now = Utc::now();

        let open = invitation(Duration::days(7));
        assert_eq!(open.effective_status(now), InvitationStatus::Pending);
        assert!(open.is_open_at(now));

        let stale = invitation(Duration::seconds(-1));
        assert_eq!(stale.status, InvitationStatus::Pending);
        assert_eq!(stale.effective_status(now), InvitationStatus::Expired);
        assert!(!stale.is_open_at(now));

        let mut revoked = invitation(Duration::seconds(-1));
        revoked.status = InvitationStatus::Revoked;
        assert_eq!(revoked.effective_status(now), InvitationStatus::Revoked);
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let inv = invitation(Duration::days(1));
        assert!(inv.is_expired_at(inv.expires_at));
        assert!(!inv.is_expired_at(inv.expires_at - Duration::milliseconds(1)));
    }

    #[test]
    fn test_status_wire_names() {
        for status in [
            InvitationStatus::Pending,
            InvitationStatus::Accepted,
            InvitationStatus::Expired,
            InvitationStatus::Revoked,
        ] {
            assert_eq!(InvitationStatus::parse(status.as_str()), Some(status));
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
        assert!(!InvitationStatus::Pending.is_terminal());
        assert!(InvitationStatus::Accepted.is_terminal());
    }

    #[test]
    fn test_member_from_invitation() {
        let inv = invitation(Duration::days(7));
        let principal = VerifiedPrincipal::new(Uuid::now_v7(), "bob@example.com")
            .with_verified_email()
            .with_display_name("Bob");
        let now = Utc::now();

        let member = TeamMember::from_invitation(&inv, &principal, now);
        assert_eq!(member.user_id, principal.id);
        assert_eq!(member.tenant_id, inv.tenant_id);
        assert_eq!(member.role, Role::Marketer);
        assert_eq!(member.invited_by, inv.invited_by);
        assert_eq!(member.joined_at, Some(now));
        assert_eq!(member.display_name.as_deref(), Some("Bob"));
        assert!(member.is_active);
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("superadmin").unwrap(), Role::SuperAdmin);
        assert!(matches!(parse_role("owner"), Err(TeamError::InvalidArgument(_))));
    }

    #[test]
    fn test_member_update_builders() {
        assert!(MemberUpdate::default().is_empty());
        let update = MemberUpdate::role(Role::Analyst).with_active(false);
        assert_eq!(update.role, Some(Role::Analyst));
        assert_eq!(update.is_active, Some(false));
        assert!(!update.is_empty());
    }
}
