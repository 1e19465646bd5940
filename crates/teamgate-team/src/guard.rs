//! Uniqueness guards
//!
//! A guard is a small document whose id is the uniqueness key (for example
//! `{tenant}:{email}`) and whose body names the record holding the key. The
//! store's atomic `create` lets exactly one writer take a free key; a key held
//! by a record that no longer qualifies is taken over with a conditional
//! update against the guard's version.
//!
//! A guard is claimed before its record is written, so a guard naming a
//! missing record is usually a write still in flight. Only a guard older than
//! [`IN_FLIGHT_GRACE_SECS`] with no record behind it counts as abandoned.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TeamError, TeamResult};
use crate::store::{self, DocumentStore, StoreError};

/// How long a guard may name a record that does not exist yet.
pub(crate) const IN_FLIGHT_GRACE_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GuardRecord {
    pub target_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl GuardRecord {
    fn pointing_at(target_id: Uuid) -> Self {
        Self {
            target_id,
            updated_at: Utc::now(),
        }
    }
}

/// Result of trying to take a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    /// The key was free and is now ours at this version.
    Acquired(u64),
    /// Someone holds the key.
    Held {
        target_id: Uuid,
        version: u64,
        claimed_at: DateTime<Utc>,
    },
}

impl Claim {
    /// Whether a held guard whose record is missing may be taken over.
    pub(crate) fn is_abandoned(&self, now: DateTime<Utc>) -> bool {
        match self {
            Claim::Acquired(_) => false,
            Claim::Held { claimed_at, .. } => {
                now.signed_duration_since(*claimed_at) > Duration::seconds(IN_FLIGHT_GRACE_SECS)
            }
        }
    }
}

pub(crate) fn key(tenant_id: Uuid, subject: &str) -> String {
    format!("{tenant_id}:{subject}")
}

/// Try to take `key` for `target_id`.
pub(crate) async fn claim(
    store: &dyn DocumentStore,
    collection: &str,
    key: &str,
    target_id: Uuid,
) -> TeamResult<Claim> {
    let doc = store::encode(&GuardRecord::pointing_at(target_id))?;

    // A guard released between our create and get is free again; one more
    // create settles it either way.
    for _ in 0..2 {
        match store.create(collection, key, doc.clone()).await {
            Ok(version) => return Ok(Claim::Acquired(version)),
            Err(StoreError::AlreadyExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(held) = store::load::<GuardRecord>(store, collection, key).await? {
            return Ok(Claim::Held {
                target_id: held.value.target_id,
                version: held.version,
                claimed_at: held.value.updated_at,
            });
        }
    }

    Err(TeamError::Conflict(
        "concurrent update in progress, retry".to_string(),
    ))
}

/// Take over a stale guard read at `expected_version`.
///
/// Returns `None` if someone else changed the guard first.
pub(crate) async fn take_over(
    store: &dyn DocumentStore,
    collection: &str,
    key: &str,
    target_id: Uuid,
    expected_version: u64,
) -> TeamResult<Option<u64>> {
    let fields = store::encode(&GuardRecord::pointing_at(target_id))?;
    match store
        .conditional_update(collection, key, fields, expected_version)
        .await
    {
        Ok(version) => Ok(Some(version)),
        Err(StoreError::VersionMismatch { .. } | StoreError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Release `key` if it still points at `target_id`. Best effort.
pub(crate) async fn release(store: &dyn DocumentStore, collection: &str, key: &str, target_id: Uuid) {
    let held = match store::load::<GuardRecord>(store, collection, key).await {
        Ok(Some(held)) if held.value.target_id == target_id => held,
        Ok(_) => return,
        Err(e) => {
            tracing::warn!(collection, error = %e, "Failed to read guard for release");
            return;
        }
    };

    match store.delete(collection, key, Some(held.version)).await {
        Ok(()) | Err(StoreError::NotFound { .. } | StoreError::VersionMismatch { .. }) => {}
        Err(e) => tracing::warn!(collection, error = %e, "Failed to release guard"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentStore;

    const GUARDS: &str = "guards";

    #[tokio::test]
    async fn test_claim_and_release() {
        let store = MemoryDocumentStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        let first = claim(&store, GUARDS, "k", a).await.unwrap();
        assert!(matches!(first, Claim::Acquired(_)));

        let second = claim(&store, GUARDS, "k", b).await.unwrap();
        assert!(matches!(second, Claim::Held { target_id, .. } if target_id == a));

        // Releasing on behalf of the wrong holder is a no-op.
        release(&store, GUARDS, "k", b).await;
        assert!(matches!(
            claim(&store, GUARDS, "k", b).await.unwrap(),
            Claim::Held { .. }
        ));

        release(&store, GUARDS, "k", a).await;
        assert!(matches!(
            claim(&store, GUARDS, "k", b).await.unwrap(),
            Claim::Acquired(_)
        ));
    }

    #[tokio::test]
    async fn test_take_over_is_conditional() {
        let store = MemoryDocumentStore::new();
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());

        claim(&store, GUARDS, "k", a).await.unwrap();
        let Claim::Held { version, .. } = claim(&store, GUARDS, "k", b).await.unwrap() else {
            panic!("expected held guard");
        };

        assert!(take_over(&store, GUARDS, "k", b, version).await.unwrap().is_some());
        // The same stale version cannot win twice.
        assert!(take_over(&store, GUARDS, "k", c, version).await.unwrap().is_none());

        let Claim::Held { target_id, .. } = claim(&store, GUARDS, "k", c).await.unwrap() else {
            panic!("expected held guard");
        };
        assert_eq!(target_id, b);
    }

    #[tokio::test]
    async fn test_fresh_guard_is_not_abandoned() {
        let store = MemoryDocumentStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        claim(&store, GUARDS, "k", a).await.unwrap();
        let held = claim(&store, GUARDS, "k", b).await.unwrap();
        let now = Utc::now();
        assert!(!held.is_abandoned(now));
        assert!(held.is_abandoned(now + Duration::seconds(IN_FLIGHT_GRACE_SECS + 1)));
        assert!(!Claim::Acquired(1).is_abandoned(now));
    }
}
