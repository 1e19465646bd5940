//! # Teamgate Team
//!
//! Tenant team management: who belongs to which tenant with which role, how
//! they got there, and whether they may do what they ask.
//!
//! ## Overview
//!
//! The teamgate-team crate handles:
//! - **Authorization**: `AuthorizationEngine` decides `(principal, tenant, permission)`
//!   from global role grants and active memberships, denying on any doubt
//! - **Memberships**: `TeamMembershipManager` creates, updates, removes and lists members
//!   under the role hierarchy and the last-Admin rule
//! - **Invitations**: `InvitationManager` runs the `Pending -> Accepted | Expired | Revoked`
//!   state machine with single-use tokens
//! - **Persistence**: the `DocumentStore` seam with an in-memory implementation
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use teamgate_auth::VerifiedPrincipal;
//! use teamgate_events::MemoryEventBus;
//! use teamgate_rbac::{Role, RoleCatalog};
//! use teamgate_team::{
//!     AuthorizationEngine, EventBusNotifier, InvitationManager, MemoryDocumentStore, NewMember,
//!     TeamConfig, TeamMembershipManager,
//! };
//! use uuid::Uuid;
//!
//! # async fn run() -> teamgate_team::TeamResult<()> {
//! let store = Arc::new(MemoryDocumentStore::new());
//! let engine = Arc::new(AuthorizationEngine::new(Arc::new(RoleCatalog::standard()), store.clone()));
//! let notifier = Arc::new(EventBusNotifier::new(Arc::new(MemoryEventBus::new())));
//! let members = Arc::new(TeamMembershipManager::new(
//!     engine.clone(),
//!     store,
//!     notifier,
//!     TeamConfig::from_env(),
//! )?);
//! let invitations = InvitationManager::new(members.clone());
//!
//! // Bootstrap a tenant Admin through a global operator.
//! let root = Uuid::now_v7();
//! engine.grant_global_role(root, Role::SuperAdmin).await?;
//! let tenant = Uuid::now_v7();
//! let alice = Uuid::now_v7();
//! members
//!     .create_member(root, tenant, NewMember::new(alice, "alice@example.com", Role::Admin))
//!     .await?;
//!
//! // Alice invites Bob, Bob accepts.
//! let issued = invitations
//!     .invite(alice, tenant, "bob@example.com", Role::Marketer, None)
//!     .await?;
//! let bob = VerifiedPrincipal::new(Uuid::now_v7(), "bob@example.com").with_verified_email();
//! let member = invitations.accept(issued.token.expose(), &bob).await?;
//! assert_eq!(member.role, Role::Marketer);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod deadline;
pub mod engine;
pub mod error;
mod guard;
pub mod invitation;
pub mod memory;
pub mod membership;
pub mod model;
pub mod notifier;
pub mod page;
pub mod redact;
pub mod store;

// Re-export main types
pub use config::{ConfigError, TeamConfig};
pub use engine::AuthorizationEngine;
pub use error::{TeamError, TeamResult};
pub use invitation::InvitationManager;
pub use memory::MemoryDocumentStore;
pub use membership::TeamMembershipManager;
pub use model::{
    Decision, GlobalRoleGrant, InvitationStatus, IssuedInvitation, MemberUpdate, NewMember,
    RoleChangeOutcome, TeamInvitation, TeamMember,
};
pub use notifier::{EventBusNotifier, NoopNotifier, Notifier, NotifyError};
pub use page::{Page, PageRequest};
pub use store::{DocumentStore, StoreError};
