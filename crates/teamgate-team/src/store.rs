//! Document store contract
//!
//! The engine persists JSON documents in named collections through this seam.
//! Every write yields a new version; `conditional_update` and versioned
//! `delete` are the optimistic-concurrency primitives the invitation state
//! machine and the uniqueness guards rely on.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// A stored JSON document.
pub type Document = serde_json::Value;

/// Collection names used by the team engine.
pub mod collections {
    /// `TeamMember` records keyed by membership id
    pub const MEMBERS: &str = "team_members";
    /// `TeamInvitation` records keyed by invitation id
    pub const INVITATIONS: &str = "team_invitations";
    /// Token hash -> invitation id
    pub const INVITATION_TOKENS: &str = "team_invitation_tokens";
    /// `{tenant}:{email}` -> pending invitation id
    pub const PENDING_INVITATIONS: &str = "team_pending_invitations";
    /// `{tenant}:{user}` -> active membership id
    pub const ACTIVE_MEMBERS: &str = "team_active_members";
    /// Tenant id -> ids of the tenant's active Admins
    pub const ADMIN_ROSTERS: &str = "team_admin_rosters";
    /// `GlobalRoleGrant` records keyed by principal id
    pub const GLOBAL_ROLES: &str = "global_roles";
}

/// Store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `create` found an existing document
    #[error("Document {collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },

    /// A conditional write lost the race
    #[error("Version mismatch on {collection}/{id}: expected {expected}, found {actual}")]
    VersionMismatch {
        collection: String,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// The target document does not exist
    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// Backend unreachable or failing
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// A document together with its id and current version.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub value: Document,
    pub version: u64,
}

/// A decoded value with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// Sort direction for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Ordering clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Position to resume a query from: the order key and id of the last item seen.
#[derive(Debug, Clone, PartialEq)]
pub struct StartAfter {
    pub value: Document,
    pub id: String,
}

/// Equality-filtered, ordered, bounded query.
///
/// Results are ordered by `order_by` and then by document id, so `start_after`
/// is a total position even when order keys collide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Document)>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub start_after: Option<StartAfter>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Document>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, value: Document, id: impl Into<String>) -> Self {
        self.start_after = Some(StartAfter {
            value,
            id: id.into(),
        });
        self
    }
}

/// Persistence collaborator.
///
/// Implementations must be linearizable per document: a `conditional_update`
/// or versioned `delete` succeeds only if no other write to that document
/// happened since the expected version was read, and `create` succeeds for
/// exactly one of any set of concurrent callers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>>;

    /// Insert a document if absent; `AlreadyExists` otherwise.
    async fn create(&self, collection: &str, id: &str, value: Document) -> StoreResult<u64>;

    /// Insert or replace a document unconditionally.
    async fn set(&self, collection: &str, id: &str, value: Document) -> StoreResult<u64>;

    /// Shallow-merge `fields` into the document if its version is still
    /// `expected_version`.
    async fn conditional_update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        expected_version: u64,
    ) -> StoreResult<u64>;

    /// Delete a document, optionally only at `expected_version`.
    async fn delete(
        &self,
        collection: &str,
        id: &str,
        expected_version: Option<u64>,
    ) -> StoreResult<()>;

    /// Run a query.
    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>>;
}

/// Encode a value as a document.
pub fn encode<T: Serialize>(value: &T) -> StoreResult<Document> {
    Ok(serde_json::to_value(value)?)
}

/// Decode a stored document.
pub fn decode<T: DeserializeOwned>(doc: StoredDocument) -> StoreResult<Versioned<T>> {
    Ok(Versioned {
        value: serde_json::from_value(doc.value)?,
        version: doc.version,
    })
}

/// Read and decode a document.
pub async fn load<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> StoreResult<Option<Versioned<T>>> {
    store.get(collection, id).await?.map(decode).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_builder() {
        let query = Query::new()
            .filter("tenant_id", "t-1")
            .filter("is_active", true)
            .order_by("created_at", Direction::Ascending)
            .limit(10)
            .start_after(json!("2024-01-01T00:00:00Z"), "abc");

        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[1], ("is_active".to_string(), json!(true)));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.start_after.as_ref().map(|s| s.id.as_str()), Some("abc"));
    }

    #[test]
    fn test_decode_reports_serialization_errors() {
        let doc = StoredDocument {
            id: "x".to_string(),
            value: json!({"not": "a number"}),
            version: 3,
        };
        let result: StoreResult<Versioned<u32>> = decode(doc);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
