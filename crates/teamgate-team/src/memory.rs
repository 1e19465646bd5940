//! In-memory document store
//!
//! Suitable for single-process deployments and tests. Versions come from a
//! store-wide counter, so a document that is deleted and recreated never
//! reuses a version an earlier reader may still hold.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::store::{
    Direction, Document, DocumentStore, Query, StoreError, StoreResult, StoredDocument,
};

#[derive(Debug, Default)]
struct Collections {
    docs: HashMap<String, HashMap<String, (Document, u64)>>,
    last_version: u64,
}

impl Collections {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }
}

/// In-memory [`DocumentStore`].
///
/// [`set_unavailable`](Self::set_unavailable) makes every call fail with
/// `StoreError::Unavailable`, for exercising outage paths.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Collections>,
    unavailable: AtomicBool,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (or recover from one).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .docs
            .get(collection)
            .map_or(0, HashMap::len)
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn not_found(collection: &str, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    fn check_version(collection: &str, id: &str, expected: u64, actual: u64) -> StoreResult<()> {
        if expected != actual {
            return Err(StoreError::VersionMismatch {
                collection: collection.to_string(),
                id: id.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// Total order over JSON values used for `order_by`.
///
/// RFC 3339 strings compare as instants (fractional-second widths vary, so
/// lexicographic order would be wrong); numbers compare numerically; values of
/// different kinds order null < bool < number < string < other.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.with_timezone(&Utc).cmp(&y.with_timezone(&Utc)),
                _ => x.cmp(y),
            }
        }
        _ => rank(a).cmp(&rank(b)).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn field<'a>(doc: &'a Document, name: &str) -> &'a Value {
    doc.get(name).unwrap_or(&Value::Null)
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        self.ensure_available()?;
        let inner = self.inner.read().await;
        Ok(inner
            .docs
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|(value, version)| StoredDocument {
                id: id.to_string(),
                value: value.clone(),
                version: *version,
            }))
    }

    async fn create(&self, collection: &str, id: &str, value: Document) -> StoreResult<u64> {
        self.ensure_available()?;
        let mut inner = self.inner.write().await;
        let exists = inner
            .docs
            .get(collection)
            .is_some_and(|docs| docs.contains_key(id));
        if exists {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        let version = inner.next_version();
        inner
            .docs
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), (value, version));
        Ok(version)
    }

    async fn set(&self, collection: &str, id: &str, value: Document) -> StoreResult<u64> {
        self.ensure_available()?;
        let mut inner = self.inner.write().await;
        let version = inner.next_version();
        inner
            .docs
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), (value, version));
        Ok(version)
    }

    async fn conditional_update(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
        expected_version: u64,
    ) -> StoreResult<u64> {
        self.ensure_available()?;
        let Value::Object(fields) = fields else {
            return Err(StoreError::Serialization(
                "update fields must be a JSON object".to_string(),
            ));
        };

        let mut inner = self.inner.write().await;
        let version = inner.next_version();
        let (doc, current) = inner
            .docs
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| Self::not_found(collection, id))?;
        Self::check_version(collection, id, expected_version, *current)?;

        let Value::Object(target) = doc else {
            return Err(StoreError::Serialization(format!(
                "{collection}/{id} is not a JSON object"
            )));
        };
        target.extend(fields);
        *current = version;
        Ok(version)
    }

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        expected_version: Option<u64>,
    ) -> StoreResult<()> {
        self.ensure_available()?;
        let mut inner = self.inner.write().await;
        let docs = inner
            .docs
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection, id))?;
        let (_, current) = docs.get(id).ok_or_else(|| Self::not_found(collection, id))?;
        if let Some(expected) = expected_version {
            Self::check_version(collection, id, expected, *current)?;
        }
        docs.remove(id);
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>> {
        self.ensure_available()?;
        let inner = self.inner.read().await;
        let Some(docs) = inner.docs.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<StoredDocument> = docs
            .iter()
            .filter(|(_, (doc, _))| {
                query
                    .filters
                    .iter()
                    .all(|(name, expected)| field(doc, name) == expected)
            })
            .map(|(id, (doc, version))| StoredDocument {
                id: id.clone(),
                value: doc.clone(),
                version: *version,
            })
            .collect();
        drop(inner);

        let (order_field, direction) = match &query.order_by {
            Some(order) => (Some(order.field.as_str()), order.direction),
            None => (None, Direction::Ascending),
        };
        let position = |value: &Value, id: &str, other_value: &Value, other_id: &str| {
            let ordering = compare_values(value, other_value).then_with(|| id.cmp(other_id));
            match direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        };
        let key = |doc: &StoredDocument| -> Value {
            order_field.map_or(Value::Null, |name| field(&doc.value, name).clone())
        };

        matches.sort_by(|a, b| position(&key(a), &a.id, &key(b), &b.id));

        if let Some(cursor) = &query.start_after {
            matches.retain(|doc| {
                position(&key(doc), &doc.id, &cursor.value, &cursor.id) == Ordering::Greater
            });
        }
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_is_insert_if_absent() {
        let store = MemoryDocumentStore::new();
        let v1 = store.create("c", "a", json!({"n": 1})).await.unwrap();
        let err = store.create("c", "a", json!({"n": 2})).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        let doc = store.get("c", "a").await.unwrap().unwrap();
        assert_eq!(doc.value, json!({"n": 1}));
        assert_eq!(doc.version, v1);
    }

    #[tokio::test]
    async fn test_conditional_update_merges_and_bumps_version() {
        let store = MemoryDocumentStore::new();
        let v1 = store
            .create("c", "a", json!({"status": "pending", "keep": true}))
            .await
            .unwrap();

        let v2 = store
            .conditional_update("c", "a", json!({"status": "accepted"}), v1)
            .await
            .unwrap();
        assert!(v2 > v1);

        let doc = store.get("c", "a").await.unwrap().unwrap();
        assert_eq!(doc.value, json!({"status": "accepted", "keep": true}));

        let stale = store
            .conditional_update("c", "a", json!({"status": "revoked"}), v1)
            .await;
        assert!(matches!(
            stale,
            Err(StoreError::VersionMismatch { expected, actual, .. }) if expected == v1 && actual == v2
        ));

        let missing = store
            .conditional_update("c", "zzz", json!({"status": "revoked"}), v1)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_versions_are_not_reused_after_delete() {
        let store = MemoryDocumentStore::new();
        let v1 = store.create("c", "a", json!({})).await.unwrap();
        store.delete("c", "a", Some(v1)).await.unwrap();
        let v2 = store.create("c", "a", json!({})).await.unwrap();
        assert_ne!(v1, v2);

        // A holder of the old version cannot delete the new document.
        let err = store.delete("c", "a", Some(v1)).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionMismatch { .. }));
        assert!(store.get("c", "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let store = MemoryDocumentStore::new();
        assert!(matches!(
            store.delete("c", "a", None).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_filters_orders_and_resumes() {
        let store = MemoryDocumentStore::new();
        // Mixed fractional-second widths sort as instants, not strings.
        let rows = [
            ("d", "t1", "2024-01-01T00:00:00.5Z"),
            ("b", "t1", "2024-01-01T00:00:00Z"),
            ("a", "t1", "2024-01-01T00:00:00.123456789Z"),
            ("c", "t2", "2024-01-01T00:00:00Z"),
            ("e", "t1", "2024-01-01T00:00:00.5Z"),
        ];
        for (id, tenant, at) in rows {
            store
                .create("m", id, json!({"tenant": tenant, "at": at}))
                .await
                .unwrap();
        }

        let query = Query::new()
            .filter("tenant", "t1")
            .order_by("at", Direction::Ascending);
        let ids: Vec<String> = store
            .query("m", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "d", "e"]);

        let page = store
            .query(
                "m",
                &query
                    .clone()
                    .start_after(json!("2024-01-01T00:00:00.5Z"), "d")
                    .limit(5),
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "e");

        let desc = Query::new()
            .filter("tenant", "t1")
            .order_by("at", Direction::Descending)
            .limit(2);
        let ids: Vec<String> = store
            .query("m", &desc)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["e", "d"]);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryDocumentStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.get("c", "a").await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.get("c", "a").await.unwrap().is_none());
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&Value::Null, &json!(false)), Ordering::Less);
    }
}
