//! Layout of a history entry as stored in the browser's session history.

use crate::types::{Page, ScrollRegion};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key whose presence marks a history state as written by this crate.
pub const ENTRY_MARKER: &str = "__pageturn";

/// Current entry format version (the value stored under [`ENTRY_MARKER`]).
pub const ENTRY_FORMAT: u32 = 1;

/// Scroll offsets saved alongside an entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollRecord {
    pub document: ScrollRegion,
    pub regions: Vec<ScrollRegion>,
}

/// Page payload of an entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryPayload {
    /// The snapshot itself.
    Direct { page: Page },
    /// Base64 text of a codec blob.
    Encoded { blob: String },
}

impl EntryPayload {
    pub fn is_encoded(&self) -> bool {
        matches!(self, EntryPayload::Encoded { .. })
    }
}

/// One session-history entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "__pageturn")]
    pub format: u32,

    /// History epoch the entry was written in.
    pub epoch: u64,

    /// Monotonic tag assigned when the entry was pushed.
    pub seq: u64,

    pub payload: EntryPayload,

    #[serde(default)]
    pub scroll: ScrollRecord,
}

impl HistoryEntry {
    /// Parse a raw history state. Returns `None` for foreign shapes.
    pub fn parse(raw: &Value) -> Option<Self> {
        let marker = raw.as_object()?.get(ENTRY_MARKER)?.as_u64()?;
        if marker != u64::from(ENTRY_FORMAT) {
            return None;
        }
        serde_json::from_value(raw.clone()).ok()
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// URL the entry was written for, if the payload is readable without decoding.
    pub fn direct_page(&self) -> Option<&Page> {
        match &self.payload {
            EntryPayload::Direct { page } => Some(page),
            EntryPayload::Encoded { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> HistoryEntry {
        HistoryEntry {
            format: ENTRY_FORMAT,
            epoch: 0,
            seq: 1,
            payload: EntryPayload::Direct {
                page: Page::new("Home", "/"),
            },
            scroll: ScrollRecord::default(),
        }
    }

    #[test]
    fn test_written_entry_parses() {
        let value = entry().to_value().unwrap();
        assert_eq!(value[ENTRY_MARKER], 1);
        assert_eq!(HistoryEntry::parse(&value), Some(entry()));
    }

    #[test]
    fn test_foreign_states_are_rejected() {
        assert!(HistoryEntry::parse(&json!(null)).is_none());
        assert!(HistoryEntry::parse(&json!("state")).is_none());
        assert!(HistoryEntry::parse(&json!({"page": {"component": "Home"}})).is_none());
        assert!(HistoryEntry::parse(&json!({"__pageturn": 99, "epoch": 0})).is_none());
    }

    #[test]
    fn test_marker_with_broken_body_is_rejected() {
        let value = json!({"__pageturn": 1, "epoch": 0, "seq": 1, "payload": {"kind": "zip"}});
        assert!(HistoryEntry::parse(&value).is_none());
    }
}
