//! Cursor pagination
//!
//! A cursor is the order key and id of the last item on a page, encoded as
//! URL-safe base64 JSON. Cursors are opaque to callers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{TeamError, TeamResult};
use crate::store::{Document, StartAfter};

/// Which page to fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Page size; the configured default when absent
    pub limit: Option<usize>,
    /// Cursor returned with the previous page
    pub cursor: Option<String>,
}

impl PageRequest {
    /// The first page with the default size.
    pub fn first() -> Self {
        Self::default()
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Continue after a previous page.
    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

#[derive(Serialize, Deserialize)]
struct CursorBody {
    k: Document,
    id: String,
}

pub(crate) fn encode_cursor(key: Document, id: &str) -> TeamResult<String> {
    let body = serde_json::to_vec(&CursorBody {
        k: key,
        id: id.to_string(),
    })
    .map_err(|e| TeamError::Unavailable(format!("cursor encoding failed: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(body))
}

pub(crate) fn decode_cursor(cursor: &str) -> TeamResult<StartAfter> {
    let invalid = || TeamError::InvalidArgument("invalid page cursor".to_string());
    let bytes = URL_SAFE_NO_PAD.decode(cursor.trim()).map_err(|_| invalid())?;
    let body: CursorBody = serde_json::from_slice(&bytes).map_err(|_| invalid())?;
    Ok(StartAfter {
        value: body.k,
        id: body.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cursor_round_trip() {
        let cursor = encode_cursor(json!("2024-05-01T10:00:00Z"), "abc").unwrap();
        let start = decode_cursor(&cursor).unwrap();
        assert_eq!(start.value, json!("2024-05-01T10:00:00Z"));
        assert_eq!(start.id, "abc");
    }

    #[test]
    fn test_garbage_cursor_is_invalid_argument() {
        assert!(matches!(
            decode_cursor("!!not base64!!"),
            Err(TeamError::InvalidArgument(_))
        ));
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(
            decode_cursor(&not_json),
            Err(TeamError::InvalidArgument(_))
        ));
    }
}
