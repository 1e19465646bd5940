//! # Teamgate Authentication
//!
//! Identity primitives consumed by the team engine: turning a bearer credential
//! into a verified principal, and minting/hashing single-use invitation tokens.
//!
//! ## Overview
//!
//! The teamgate-auth crate handles:
//! - **Principals**: `VerifiedPrincipal` carries the id and email an identity
//!   provider vouched for
//! - **Verification**: the `IdentityVerifier` seam, plus a JWT implementation
//! - **Invitation tokens**: CSPRNG tokens that are only ever stored hashed
//!
//! ## Features
//!
//! - `jwt` (default): HMAC-signed bearer tokens using jsonwebtoken
//!
//! ## Usage
//!
//! ### Verifying a bearer token
//!
//! ```rust,no_run
//! use teamgate_auth::{IdentityVerifier, JwtIdentityVerifier, VerifiedPrincipal};
//! use uuid::Uuid;
//!
//! # async fn run() -> teamgate_auth::AuthResult<()> {
//! let verifier = JwtIdentityVerifier::with_secret("your-secret-key")?;
//!
//! let principal = VerifiedPrincipal::new(Uuid::now_v7(), "bob@example.com").with_verified_email();
//! let bearer = verifier.issue(&principal)?;
//!
//! let verified = verifier.verify(&bearer).await?;
//! assert_eq!(verified.id, principal.id);
//! # Ok(())
//! # }
//! ```
//!
//! ### Invitation tokens
//!
//! ```rust
//! use teamgate_auth::InvitationToken;
//!
//! let token = InvitationToken::generate();
//! let stored = token.hash();
//!
//! // The plaintext goes to the invitee; only the hash is persisted.
//! assert_eq!(InvitationToken::hash_str(token.expose()), stored);
//! assert_eq!(format!("{token:?}"), "InvitationToken([REDACTED])");
//! ```

pub mod error;
pub mod identity;
#[cfg(feature = "jwt")]
pub mod jwt;
pub mod token;

// Re-export main types
pub use error::{AuthError, AuthResult};
pub use identity::{IdentityVerifier, VerifiedPrincipal};
pub use token::InvitationToken;

#[cfg(feature = "jwt")]
pub use jwt::{IdentityClaims, JwtAlgorithm, JwtIdentityVerifier, JwtVerifierConfig};
