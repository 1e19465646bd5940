//! Outbound notifications
//!
//! The managers report every transition to a [`Notifier`]. Delivery is best
//! effort: a failed notification is logged and never fails the operation.

use std::sync::Arc;

use async_trait::async_trait;
use teamgate_events::{EventBus, EventBusError, TeamEvent};
use thiserror::Error;

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The downstream channel rejected or dropped the notification
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

impl From<EventBusError> for NotifyError {
    fn from(err: EventBusError) -> Self {
        NotifyError::Delivery(err.to_string())
    }
}

/// Receives team events (invitation emails, audit trails).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event.
    async fn notify(&self, event: TeamEvent) -> Result<(), NotifyError>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: TeamEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Publishes events onto an [`EventBus`] under `team.*` topics.
pub struct EventBusNotifier {
    bus: Arc<dyn EventBus>,
}

impl std::fmt::Debug for EventBusNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBusNotifier").finish_non_exhaustive()
    }
}

impl EventBusNotifier {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Notifier for EventBusNotifier {
    async fn notify(&self, event: TeamEvent) -> Result<(), NotifyError> {
        self.bus.publish(event.to_event()?).await?;
        Ok(())
    }
}

/// Deliver an event, logging instead of propagating a failure.
pub(crate) async fn dispatch(notifier: &dyn Notifier, event: TeamEvent) {
    let event_type = event.event_type();
    let tenant_id = event.tenant_id();
    if let Err(e) = notifier.notify(event).await {
        tracing::warn!(event_type, %tenant_id, error = %e, "Notification failed");
    }
}
