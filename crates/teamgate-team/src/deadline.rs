//! Caller deadlines
//!
//! Operations never time out on their own. A caller that wants a bound wraps
//! the call in [`within`]; dropping the future cancels it, and any write that
//! committed before the deadline stands.

use std::future::Future;
use std::time::Duration;

use crate::error::{TeamError, TeamResult};

/// Run a team operation with a deadline.
///
/// # Returns
///
/// The operation's own result, or `TeamError::DeadlineExceeded` if it did
/// not finish within `duration`
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use teamgate_team::deadline;
/// # async fn run(engine: &teamgate_team::AuthorizationEngine, actor: uuid::Uuid, tenant: uuid::Uuid) -> teamgate_team::TeamResult<()> {
/// let role = deadline::within(
///     Duration::from_millis(250),
///     engine.authorize(actor, tenant, teamgate_rbac::Permission::TenantReadUsers),
/// )
/// .await?;
/// # let _ = role;
/// # Ok(())
/// # }
/// ```
pub async fn within<F, T>(duration: Duration, operation: F) -> TeamResult<T>
where
    F: Future<Output = TeamResult<T>>,
{
    tokio::time::timeout(duration, operation)
        .await
        .map_err(|_| TeamError::DeadlineExceeded)?
}
