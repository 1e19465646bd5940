//! Verified principals and the identity verifier seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthResult;

/// An identity vouched for by the identity provider.
///
/// Independent of any tenant: tenant access is decided later by the
/// authorization engine from memberships and global role grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedPrincipal {
    /// Principal id
    pub id: Uuid,

    /// Email address as reported by the provider
    pub email: String,

    /// Whether the provider has verified the email address
    #[serde(default)]
    pub email_verified: bool,

    /// Display name, if the provider supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl VerifiedPrincipal {
    /// Create a principal with an unverified email.
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            email_verified: false,
            display_name: None,
        }
    }

    /// Mark the email as verified.
    pub fn with_verified_email(mut self) -> Self {
        self.email_verified = true;
        self
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Check whether this principal owns `email` (verified, case-insensitive).
    ///
    /// Case folding uses full Unicode lower-casing, the same rule applied to
    /// stored invitation emails.
    pub fn owns_email(&self, email: &str) -> bool {
        self.email_verified && self.email.trim().to_lowercase() == email.trim().to_lowercase()
    }
}

/// Turns a bearer credential into a verified principal.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify a credential.
    ///
    /// # Arguments
    ///
    /// * `credential` - The raw bearer credential
    ///
    /// # Returns
    ///
    /// The principal the credential identifies, or an `AuthError` describing
    /// why it was rejected
    async fn verify(&self, credential: &str) -> AuthResult<VerifiedPrincipal>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owns_email_requires_verification() {
        let principal = VerifiedPrincipal::new(Uuid::now_v7(), "Bob@Example.com");
        assert!(!principal.owns_email("bob@example.com"));

        let principal = principal.with_verified_email();
        assert!(principal.owns_email("bob@example.com"));
        assert!(principal.owns_email(" BOB@EXAMPLE.COM "));
        assert!(!principal.owns_email("alice@example.com"));
    }

    #[test]
    fn test_owns_email_folds_non_ascii_case() {
        let principal = VerifiedPrincipal::new(Uuid::now_v7(), "Émile@Exemple.fr").with_verified_email();
        assert!(principal.owns_email("émile@exemple.fr"));
        assert!(!principal.owns_email("emile@exemple.fr"));
    }

    #[test]
    fn test_principal_serialization() {
        let principal = VerifiedPrincipal::new(Uuid::now_v7(), "bob@example.com")
            .with_display_name("Bob");
        let json = serde_json::to_value(&principal).unwrap();
        assert_eq!(json["email"], "bob@example.com");
        assert_eq!(json["email_verified"], false);
        assert_eq!(json["display_name"], "Bob");

        let back: VerifiedPrincipal = serde_json::from_value(json).unwrap();
        assert_eq!(back, principal);
    }
}
