//! Team engine configuration.
//!
//! Loaded from environment variables with defaults suitable for production.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted invitation lifetime.
pub const MAX_INVITATION_TTL_DAYS: i64 = 365;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Configuration for the membership and invitation managers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Invitation lifetime in seconds.
    pub invitation_ttl_secs: i64,

    /// Page size used when a list request does not ask for one.
    pub default_page_size: usize,

    /// Upper bound on any requested page size.
    pub max_page_size: usize,
}

impl Default for TeamConfig {
    /// Seven-day invitations, pages of 20, at most 100.
    fn default() -> Self {
        Self {
            invitation_ttl_secs: Duration::days(7).num_seconds(),
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl TeamConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TEAMGATE_INVITATION_TTL_HOURS`: Invitation lifetime in hours (default: 168)
    /// - `TEAMGATE_DEFAULT_PAGE_SIZE`: Default page size (default: 20)
    /// - `TEAMGATE_MAX_PAGE_SIZE`: Maximum page size (default: 100)
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            invitation_ttl_secs: std::env::var("TEAMGATE_INVITATION_TTL_HOURS")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(Duration::try_hours)
                .map(|ttl| ttl.num_seconds())
                .unwrap_or(default.invitation_ttl_secs),
            default_page_size: std::env::var("TEAMGATE_DEFAULT_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.default_page_size),
            max_page_size: std::env::var("TEAMGATE_MAX_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_page_size),
        }
    }

    /// Set the invitation lifetime.
    pub fn with_invitation_ttl(mut self, ttl: Duration) -> Self {
        self.invitation_ttl_secs = ttl.num_seconds();
        self
    }

    /// Invitation lifetime as a Duration, if representable.
    pub fn invitation_ttl(&self) -> Option<Duration> {
        Duration::try_seconds(self.invitation_ttl_secs)
    }

    /// Resolve a requested page size against the configured bounds.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.invitation_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "TEAMGATE_INVITATION_TTL_HOURS".to_string(),
                message: "invitation lifetime must be positive".to_string(),
            });
        }
        if self.invitation_ttl_secs > MAX_INVITATION_TTL_DAYS * 24 * 3600 {
            return Err(ConfigError::InvalidValue {
                key: "TEAMGATE_INVITATION_TTL_HOURS".to_string(),
                message: format!("invitation lifetime must not exceed {MAX_INVITATION_TTL_DAYS} days"),
            });
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TEAMGATE_MAX_PAGE_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue {
                key: "TEAMGATE_DEFAULT_PAGE_SIZE".to_string(),
                message: format!("must be between 1 and {}", self.max_page_size),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TeamConfig::default();
        assert_eq!(config.invitation_ttl(), Some(Duration::days(7)));
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_page_size_bounds() {
        let config = TeamConfig::default();
        assert_eq!(config.page_size(None), 20);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(50)), 50);
        assert_eq!(config.page_size(Some(5000)), 100);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = TeamConfig::default().with_invitation_ttl(Duration::zero());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "TEAMGATE_INVITATION_TTL_HOURS"
        ));

        let config = TeamConfig {
            default_page_size: 500,
            ..TeamConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_caps_invitation_lifetime() {
        let config = TeamConfig::default().with_invitation_ttl(Duration::days(MAX_INVITATION_TTL_DAYS));
        assert!(config.validate().is_ok());

        let config = TeamConfig::default().with_invitation_ttl(Duration::days(MAX_INVITATION_TTL_DAYS + 1));
        assert!(config.validate().is_err());

        let config = TeamConfig {
            invitation_ttl_secs: i64::MAX / 1000,
            ..TeamConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TeamConfig {
            invitation_ttl_secs: i64::MAX,
            ..TeamConfig::default()
        };
        assert_eq!(config.invitation_ttl(), None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_falls_back_to_defaults() {
        // Unset in the test environment.
        let config = TeamConfig::from_env();
        assert!(config.validate().is_ok());
    }
}
