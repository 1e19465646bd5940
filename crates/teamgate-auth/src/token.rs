//! Invitation tokens
//!
//! Tokens are 32 bytes from the OS CSPRNG, URL-safe base64 encoded. Only the
//! SHA-256 hash is ever persisted, so a leaked store cannot be replayed.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Number of random bytes in a token.
pub const TOKEN_BYTES: usize = 32;

/// A plaintext invitation token.
///
/// `Debug` and `Display` never print the secret; use [`expose`](Self::expose)
/// when the plaintext is really needed (handing it to the invitee).
#[derive(Clone, PartialEq, Eq)]
pub struct InvitationToken(String);

impl InvitationToken {
    /// Generate a fresh token from the OS random number generator.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap a token received from a caller.
    pub fn from_plaintext(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The plaintext token.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Hash of this token, as stored.
    pub fn hash(&self) -> String {
        Self::hash_str(&self.0)
    }

    /// Hash a plaintext token for storage or lookup.
    ///
    /// SHA-256 over the UTF-8 bytes, URL-safe base64 without padding.
    pub fn hash_str(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl fmt::Debug for InvitationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InvitationToken([REDACTED])")
    }
}

impl fmt::Display for InvitationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// Serialized as the plaintext so a mail consumer can build the accept link.
impl Serialize for InvitationToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for InvitationToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_token_shape() {
        let token = InvitationToken::generate();
        // 32 bytes -> 43 base64 chars without padding
        assert_eq!(token.expose().len(), 43);
        assert!(token
            .expose()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..256)
            .map(|_| InvitationToken::generate().expose().to_string())
            .collect();
        assert_eq!(tokens.len(), 256);
    }

    #[test]
    fn test_hash_is_stable_and_not_plaintext() {
        let token = InvitationToken::from_plaintext("abc");
        assert_eq!(token.hash(), InvitationToken::hash_str("abc"));
        assert_ne!(token.hash(), "abc");
        assert_ne!(token.hash(), InvitationToken::hash_str("abd"));
        // sha256 -> 32 bytes -> 43 chars
        assert_eq!(token.hash().len(), 43);
    }

    #[test]
    fn test_debug_and_display_redact() {
        let token = InvitationToken::generate();
        let debug = format!("{token:?}");
        assert!(!debug.contains(token.expose()));
        assert_eq!(format!("{token}"), "[REDACTED]");
    }

    #[test]
    fn test_serializes_as_plaintext() {
        let token = InvitationToken::from_plaintext("tok");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"tok\"");
        let back: InvitationToken = serde_json::from_str("\"tok\"").unwrap();
        assert_eq!(back, token);
    }
}
