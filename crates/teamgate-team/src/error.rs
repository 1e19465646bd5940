//! Error types for team operations

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Team operation error types.
///
/// Every variant is returned to the caller; the only failures the managers
/// swallow are notifier deliveries.
#[derive(Debug, Error)]
pub enum TeamError {
    /// The actor is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The operation conflicts with the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The target record does not exist (in this tenant)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The invitation is past its expiry
    #[error("Invitation has expired")]
    Expired,

    /// A request argument is malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The persistence collaborator failed
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The caller's deadline elapsed before the operation finished
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

/// Result type for team operations.
pub type TeamResult<T> = Result<T, TeamError>;

impl TeamError {
    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(self, TeamError::Unavailable(_) | TeamError::DeadlineExceeded)
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            TeamError::Forbidden(_) => 403,
            TeamError::Conflict(_) => 409,
            TeamError::NotFound(_) => 404,
            TeamError::Expired => 410,
            TeamError::InvalidArgument(_) => 400,
            TeamError::Unavailable(_) => 503,
            TeamError::DeadlineExceeded => 504,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            TeamError::Forbidden(_) => "FORBIDDEN",
            TeamError::Conflict(_) => "CONFLICT",
            TeamError::NotFound(_) => "NOT_FOUND",
            TeamError::Expired => "INVITATION_EXPIRED",
            TeamError::InvalidArgument(_) => "INVALID_ARGUMENT",
            TeamError::Unavailable(_) => "UNAVAILABLE",
            TeamError::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }
}

impl From<ConfigError> for TeamError {
    fn from(err: ConfigError) -> Self {
        TeamError::InvalidArgument(err.to_string())
    }
}

impl From<StoreError> for TeamError {
    fn from(err: StoreError) -> Self {
        TeamError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(TeamError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(TeamError::Conflict("x".into()).status_code(), 409);
        assert_eq!(TeamError::NotFound("x".into()).status_code(), 404);
        assert_eq!(TeamError::Expired.status_code(), 410);
        assert_eq!(TeamError::InvalidArgument("x".into()).status_code(), 400);
        assert_eq!(TeamError::Unavailable("x".into()).status_code(), 503);
        assert_eq!(TeamError::DeadlineExceeded.status_code(), 504);
    }

    #[test]
    fn test_store_errors_become_unavailable() {
        let err: TeamError = StoreError::Unavailable("connection reset".into()).into();
        assert!(matches!(err, TeamError::Unavailable(_)));
        assert!(err.is_server_error());
        assert_eq!(err.error_code(), "UNAVAILABLE");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TeamError::Conflict("already processed".into()).to_string(),
            "Conflict: already processed"
        );
        assert!(!TeamError::Expired.is_server_error());
    }
}
