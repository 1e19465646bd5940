//! Event types for team membership and invitations
//!
//! Every state transition of a membership or an invitation is described by a
//! [`TeamEvent`]; buses carry them wrapped in the generic [`Event`] envelope.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teamgate_auth::InvitationToken;
use teamgate_rbac::Role;
use uuid::Uuid;

use crate::bus::{EventBusError, EventBusResult};

/// Prefix shared by all team topics.
pub const TOPIC_PREFIX: &str = "team";

/// Event envelope.
///
/// Carries routing and tracing metadata around a JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event type (e.g., "invitation.created", "member.removed")
    pub event_type: String,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Tenant context
    pub tenant_id: Option<Uuid>,

    /// Principal who triggered the event
    pub actor_id: Option<Uuid>,

    /// Correlation ID for tracing
    pub correlation_id: Option<String>,

    /// Event version for schema evolution
    pub version: u32,

    /// Event payload
    pub payload: serde_json::Value,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create a new event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The event type string
    /// * `payload` - The event payload
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            tenant_id: None,
            actor_id: None,
            correlation_id: None,
            version: 1,
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Set tenant context.
    pub fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Set the acting principal.
    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Set correlation ID.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Add metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get the topic for this event: `team.{event_type}`.
    pub fn topic(&self) -> String {
        format!("{}.{}", TOPIC_PREFIX, self.event_type)
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

// ============================================================================
// Team Events
// ============================================================================

/// Membership and invitation events.
///
/// `InvitationCreated` carries the plaintext token so the mail consumer can
/// build the accept link. Never log event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TeamEvent {
    /// An invitation was issued
    InvitationCreated {
        invitation_id: Uuid,
        tenant_id: Uuid,
        email: String,
        role: Role,
        invited_by: Uuid,
        expires_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        token: InvitationToken,
    },
    /// An invitation was accepted and the membership created
    InvitationAccepted {
        invitation_id: Uuid,
        tenant_id: Uuid,
        member_id: Uuid,
        user_id: Uuid,
    },
    /// An invitation was revoked
    InvitationRevoked {
        invitation_id: Uuid,
        tenant_id: Uuid,
        revoked_by: Uuid,
    },
    /// An invitation was found past its expiry and marked expired
    InvitationExpired { invitation_id: Uuid, tenant_id: Uuid },
    /// A membership was created
    MemberCreated {
        member_id: Uuid,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
    },
    /// A membership's role, activity or profile changed
    MemberUpdated {
        member_id: Uuid,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
        is_active: bool,
        changes: Vec<String>,
    },
    /// A membership was deleted
    MemberRemoved {
        member_id: Uuid,
        tenant_id: Uuid,
        user_id: Uuid,
    },
}

impl TeamEvent {
    /// The event type string, e.g. `invitation.created`.
    pub fn event_type(&self) -> &'static str {
        match self {
            TeamEvent::InvitationCreated { .. } => "invitation.created",
            TeamEvent::InvitationAccepted { .. } => "invitation.accepted",
            TeamEvent::InvitationRevoked { .. } => "invitation.revoked",
            TeamEvent::InvitationExpired { .. } => "invitation.expired",
            TeamEvent::MemberCreated { .. } => "member.created",
            TeamEvent::MemberUpdated { .. } => "member.updated",
            TeamEvent::MemberRemoved { .. } => "member.removed",
        }
    }

    /// The tenant the event belongs to.
    pub fn tenant_id(&self) -> Uuid {
        match self {
            TeamEvent::InvitationCreated { tenant_id, .. }
            | TeamEvent::InvitationAccepted { tenant_id, .. }
            | TeamEvent::InvitationRevoked { tenant_id, .. }
            | TeamEvent::InvitationExpired { tenant_id, .. }
            | TeamEvent::MemberCreated { tenant_id, .. }
            | TeamEvent::MemberUpdated { tenant_id, .. }
            | TeamEvent::MemberRemoved { tenant_id, .. } => *tenant_id,
        }
    }

    /// Wrap in an envelope.
    pub fn to_event(&self) -> EventBusResult<Event> {
        let payload = serde_json::to_value(self)
            .map_err(|e| EventBusError::SerializationError(e.to_string()))?;
        Ok(Event::new(self.event_type(), payload).with_tenant(self.tenant_id()))
    }
}
