//! # Teamgate Events
//!
//! Typed events for every membership and invitation transition, and a small
//! publish/subscribe bus to carry them to mailers and audit consumers.
//!
//! ## Overview
//!
//! The teamgate-events crate handles:
//! - **Event Types**: `TeamEvent` variants for invitations and members
//! - **Envelope**: `Event` with tenant, actor and correlation metadata
//! - **Event Bus**: Publish/subscribe with `*` / `#` topic patterns
//!
//! ## Features
//!
//! - `memory` (default): In-memory event bus for single-process apps
//!
//! ## Topics
//!
//! | topic | emitted when |
//! |---|---|
//! | `team.invitation.created` | an invitation is issued (carries the accept token) |
//! | `team.invitation.accepted` | an invitation is accepted |
//! | `team.invitation.revoked` | an invitation is revoked |
//! | `team.invitation.expired` | a lazily expired invitation is marked expired |
//! | `team.member.created` | a membership is created |
//! | `team.member.updated` | a membership changes |
//! | `team.member.removed` | a membership is deleted |
//!
//! ## Usage
//!
//! ```rust
//! use teamgate_events::{EventBus, MemoryEventBus, TeamEvent};
//! use uuid::Uuid;
//!
//! # async fn run() -> teamgate_events::EventBusResult<()> {
//! let bus = MemoryEventBus::new();
//! let mut sub = bus.subscribe("team.member.*").await?;
//!
//! let event = TeamEvent::MemberRemoved {
//!     member_id: Uuid::now_v7(),
//!     tenant_id: Uuid::now_v7(),
//!     user_id: Uuid::now_v7(),
//! };
//! bus.publish(event.to_event()?).await?;
//!
//! let received = sub.recv().await?;
//! assert_eq!(received.event_type, "member.removed");
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod types;

// Re-export main types
pub use bus::{EventBus, EventBusError, EventBusResult, EventBusStats, MemoryEventBus, Subscription};
pub use types::{Event, TeamEvent, TOPIC_PREFIX};
