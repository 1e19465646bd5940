//! JWT identity verification
//!
//! This module verifies HMAC-signed bearer tokens with the jsonwebtoken crate
//! and maps their claims onto a [`VerifiedPrincipal`]. It can also mint tokens,
//! which operator tooling and tests use to stand in for the identity provider.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::identity::{IdentityVerifier, VerifiedPrincipal};

/// Configuration for [`JwtIdentityVerifier`].
#[derive(Debug, Clone)]
pub struct JwtVerifierConfig {
    /// Shared secret for the HMAC algorithms
    pub secret: Option<String>,

    /// Algorithm to use
    pub algorithm: JwtAlgorithm,

    /// Expected token issuer
    pub issuer: String,

    /// Accepted audiences
    pub audience: Vec<String>,

    /// Lifetime of tokens minted by [`JwtIdentityVerifier::issue`]
    pub token_duration: Duration,
}

impl Default for JwtVerifierConfig {
    fn default() -> Self {
        Self {
            secret: None,
            algorithm: JwtAlgorithm::HS256,
            issuer: "teamgate".to_string(),
            audience: vec!["teamgate".to_string()],
            token_duration: Duration::hours(1),
        }
    }
}

/// Supported JWT algorithms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

impl From<JwtAlgorithm> for Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
        }
    }
}

/// Claims carried by an identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (principal id)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: Vec<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// JWT ID
    pub jti: String,

    /// Principal email
    #[serde(default)]
    pub email: String,

    /// Email verified status
    #[serde(default)]
    pub email_verified: bool,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IdentityClaims {
    /// Build claims for a principal, valid for `duration` from now.
    pub fn for_principal(
        principal: &VerifiedPrincipal,
        config: &JwtVerifierConfig,
        duration: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: principal.id.to_string(),
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
            exp: (now + duration).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::now_v7().to_string(),
            email: principal.email.clone(),
            email_verified: principal.email_verified,
            name: principal.display_name.clone(),
        }
    }

    /// Map the claims onto a principal.
    pub fn into_principal(self) -> AuthResult<VerifiedPrincipal> {
        let id = Uuid::parse_str(&self.sub)
            .map_err(|_| AuthError::InvalidToken("Subject is not a principal id".to_string()))?;
        if self.email.trim().is_empty() {
            return Err(AuthError::MissingClaim("email".to_string()));
        }

        Ok(VerifiedPrincipal {
            id,
            email: self.email,
            email_verified: self.email_verified,
            display_name: self.name,
        })
    }
}

/// Identity verifier for HMAC-signed JWT bearer tokens.
pub struct JwtIdentityVerifier {
    config: JwtVerifierConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtIdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityVerifier")
            .field("algorithm", &self.config.algorithm)
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl JwtIdentityVerifier {
    /// Create a verifier with the given configuration.
    ///
    /// # Returns
    ///
    /// The verifier, or `AuthError::ConfigError` when no secret is configured
    pub fn new(config: JwtVerifierConfig) -> AuthResult<Self> {
        let secret = config
            .secret
            .as_ref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::ConfigError("Secret required for HMAC".to_string()))?;

        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
        })
    }

    /// Create with a simple secret (HS256).
    pub fn with_secret(secret: impl Into<String>) -> AuthResult<Self> {
        Self::new(JwtVerifierConfig {
            secret: Some(secret.into()),
            ..Default::default()
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &JwtVerifierConfig {
        &self.config
    }

    /// Mint a bearer token for a principal.
    pub fn issue(&self, principal: &VerifiedPrincipal) -> AuthResult<String> {
        let claims =
            IdentityClaims::for_principal(principal, &self.config, self.config.token_duration);
        self.encode_claims(&claims)
    }

    /// Encode existing claims.
    pub fn encode_claims(&self, claims: &IdentityClaims) -> AuthResult<String> {
        let header = Header::new(self.config.algorithm.into());
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Token encoding failed: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> AuthResult<IdentityClaims> {
        if token.trim().is_empty() {
            return Err(AuthError::Unauthorized("No credential presented".to_string()));
        }

        let mut validation = Validation::new(self.config.algorithm.into());
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&self.config.audience);

        let token_data: TokenData<IdentityClaims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    AuthError::InvalidToken("Malformed token".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("Invalid signature".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    AuthError::InvalidToken("Invalid issuer".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    AuthError::InvalidToken("Invalid audience".to_string())
                }
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        Ok(token_data.claims)
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, credential: &str) -> AuthResult<VerifiedPrincipal> {
        let token = credential
            .strip_prefix("Bearer ")
            .unwrap_or(credential)
            .trim();
        self.validate_token(token)?.into_principal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret() -> String {
        "test-secret-key-for-jwt-signing-minimum-32-chars".to_string()
    }

    fn principal() -> VerifiedPrincipal {
        VerifiedPrincipal::new(Uuid::now_v7(), "bob@example.com")
            .with_verified_email()
            .with_display_name("Bob")
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let result = JwtIdentityVerifier::new(JwtVerifierConfig::default());
        assert!(matches!(result, Err(AuthError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let verifier = JwtIdentityVerifier::with_secret(test_secret()).unwrap();
        let principal = principal();

        let token = verifier.issue(&principal).unwrap();
        let verified = verifier.verify(&token).await.unwrap();
        assert_eq!(verified, principal);

        let verified = verifier.verify(&format!("Bearer {token}")).await.unwrap();
        assert_eq!(verified.id, principal.id);
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let issuer = JwtIdentityVerifier::with_secret(test_secret()).unwrap();
        let other = JwtIdentityVerifier::with_secret("another-secret-key-of-sufficient-length").unwrap();

        let token = issuer.issue(&principal()).unwrap();
        let result = other.verify(&token).await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let verifier = JwtIdentityVerifier::with_secret(test_secret()).unwrap();
        let claims = IdentityClaims::for_principal(&principal(), verifier.config(), Duration::hours(-2));
        let token = verifier.encode_claims(&claims).unwrap();

        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_wrong_audience() {
        let verifier = JwtIdentityVerifier::with_secret(test_secret()).unwrap();
        let mut claims =
            IdentityClaims::for_principal(&principal(), verifier.config(), Duration::hours(1));
        claims.aud = vec!["someone-else".to_string()];
        let token = verifier.encode_claims(&claims).unwrap();

        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_bad_subject_and_missing_email() {
        let verifier = JwtIdentityVerifier::with_secret(test_secret()).unwrap();

        let mut claims =
            IdentityClaims::for_principal(&principal(), verifier.config(), Duration::hours(1));
        claims.sub = "not-a-uuid".to_string();
        let token = verifier.encode_claims(&claims).unwrap();
        assert!(matches!(
            verifier.verify(&token).await,
            Err(AuthError::InvalidToken(_))
        ));

        let mut claims =
            IdentityClaims::for_principal(&principal(), verifier.config(), Duration::hours(1));
        claims.email = String::new();
        let token = verifier.encode_claims(&claims).unwrap();
        assert!(matches!(
            verifier.verify(&token).await,
            Err(AuthError::MissingClaim(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_credential() {
        let verifier = JwtIdentityVerifier::with_secret(test_secret()).unwrap();
        assert!(matches!(
            verifier.verify("").await,
            Err(AuthError::Unauthorized(_))
        ));
        assert!(matches!(
            verifier.verify("garbage").await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let verifier = JwtIdentityVerifier::with_secret(test_secret()).unwrap();
        let debug = format!("{verifier:?}");
        assert!(!debug.contains(&test_secret()));
        assert!(debug.contains("[REDACTED]"));
    }
}
