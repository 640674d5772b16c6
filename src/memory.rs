//! In-memory hosts for headless embedding and tests.
//!
//! [`MemoryBrowser`] models a session-history stack with a cursor plus the
//! location it implies; [`MemoryScroll`] models a document with a fixed
//! number of scroll regions.

use crate::error::{NavigationError, Result};
use crate::history::{BrowserHistory, HistoryEntry};
use crate::location::{Location, LocationVisit, NavigationType};
use crate::scroll::ScrollHost;
use crate::types::ScrollRegion;
use parking_lot::Mutex;
use serde_json::Value;
use url::Url;

#[derive(Clone, Debug)]
struct MemoryEntry {
    url: String,
    state: Option<Value>,
}

struct BrowserState {
    entries: Vec<MemoryEntry>,
    cursor: usize,
    navigation_type: NavigationType,
    stashed: Option<LocationVisit>,
    /// Full-page loads requested through `assign`/`reload`.
    loads: Vec<String>,
    reject_direct: bool,
}

/// Session history + location kept in memory.
pub struct MemoryBrowser {
    state: Mutex<BrowserState>,
}

impl MemoryBrowser {
    /// A browser with a single entry at `href` and no state.
    pub fn new(href: &str) -> Self {
        Self {
            state: Mutex::new(BrowserState {
                entries: vec![MemoryEntry {
                    url: href.to_string(),
                    state: None,
                }],
                cursor: 0,
                navigation_type: NavigationType::Navigate,
                stashed: None,
                loads: Vec::new(),
                reject_direct: false,
            }),
        }
    }

    /// Number of entries in the stack.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Index of the current entry.
    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    /// Move one entry back. Returns the state a `popstate` event would carry,
    /// or `None` if already at the first entry.
    pub fn back(&self) -> Option<Option<Value>> {
        let mut state = self.state.lock();
        if state.cursor == 0 {
            return None;
        }
        state.cursor -= 1;
        Some(state.entries[state.cursor].state.clone())
    }

    /// Move one entry forward.
    pub fn forward(&self) -> Option<Option<Value>> {
        let mut state = self.state.lock();
        if state.cursor + 1 >= state.entries.len() {
            return None;
        }
        state.cursor += 1;
        Some(state.entries[state.cursor].state.clone())
    }

    /// Overwrite the current entry's state, bypassing any format (foreign scripts).
    pub fn set_raw_state(&self, raw: Option<Value>) {
        let mut state = self.state.lock();
        let cursor = state.cursor;
        state.entries[cursor].state = raw;
    }

    /// Simulate a host that refuses to store page snapshots directly.
    pub fn reject_direct_states(&self, reject: bool) {
        self.state.lock().reject_direct = reject;
    }

    pub fn set_navigation_type(&self, navigation_type: NavigationType) {
        self.state.lock().navigation_type = navigation_type;
    }

    /// Full-page loads requested so far.
    pub fn loads(&self) -> Vec<String> {
        self.state.lock().loads.clone()
    }

    /// URLs of all entries, oldest first.
    pub fn urls(&self) -> Vec<String> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|entry| entry.url.clone())
            .collect()
    }

    fn resolve(current: &str, url: &str) -> String {
        Url::parse(current)
            .and_then(|base| base.join(url))
            .map(String::from)
            .unwrap_or_else(|_| url.to_string())
    }

    fn check(state: &BrowserState, value: &Value) -> Result<()> {
        let direct = HistoryEntry::parse(value)
            .map(|entry| !entry.payload.is_encoded())
            .unwrap_or(false);
        if state.reject_direct && direct {
            return Err(NavigationError::HistoryRejected(
                "state exceeds host quota".into(),
            ));
        }
        Ok(())
    }
}

impl BrowserHistory for MemoryBrowser {
    fn state(&self) -> Option<Value> {
        let state = self.state.lock();
        state.entries[state.cursor].state.clone()
    }

    fn push_state(&self, value: Value, url: &str) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, &value)?;

        let url = Self::resolve(&state.entries[state.cursor].url, url);
        let next = state.cursor + 1;
        state.entries.truncate(next);
        state.entries.push(MemoryEntry {
            url,
            state: Some(value),
        });
        state.cursor = next;
        Ok(())
    }

    fn replace_state(&self, value: Value, url: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        Self::check(&state, &value)?;

        let cursor = state.cursor;
        if let Some(url) = url {
            let resolved = Self::resolve(&state.entries[cursor].url, url);
            state.entries[cursor].url = resolved;
        }
        state.entries[cursor].state = Some(value);
        Ok(())
    }
}

impl Location for MemoryBrowser {
    fn href(&self) -> String {
        let state = self.state.lock();
        state.entries[state.cursor].url.clone()
    }

    fn assign(&self, url: &str) {
        let mut state = self.state.lock();
        let resolved = Self::resolve(&state.entries[state.cursor].url, url);
        state.loads.push(resolved);
    }

    fn reload(&self) {
        let mut state = self.state.lock();
        let href = state.entries[state.cursor].url.clone();
        state.loads.push(href);
    }

    fn navigation_type(&self) -> NavigationType {
        self.state.lock().navigation_type
    }

    fn stash_location_visit(&self, visit: LocationVisit) -> Result<()> {
        self.state.lock().stashed = Some(visit);
        Ok(())
    }

    fn take_location_visit(&self) -> Option<LocationVisit> {
        self.state.lock().stashed.take()
    }
}

struct ScrollState {
    document: ScrollRegion,
    regions: Vec<ScrollRegion>,
    into_view: Vec<String>,
}

/// Document and scroll regions kept in memory.
pub struct MemoryScroll {
    state: Mutex<ScrollState>,
}

impl MemoryScroll {
    pub fn new() -> Self {
        Self::with_regions(0)
    }

    /// A document with `count` registered scroll regions.
    pub fn with_regions(count: usize) -> Self {
        Self {
            state: Mutex::new(ScrollState {
                document: ScrollRegion::ORIGIN,
                regions: vec![ScrollRegion::ORIGIN; count],
                into_view: Vec::new(),
            }),
        }
    }

    /// Element ids scrolled into view, in order.
    pub fn scrolled_into_view(&self) -> Vec<String> {
        self.state.lock().into_view.clone()
    }
}

impl Default for MemoryScroll {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollHost for MemoryScroll {
    fn document_offset(&self) -> ScrollRegion {
        self.state.lock().document
    }

    fn region_offsets(&self) -> Vec<ScrollRegion> {
        self.state.lock().regions.clone()
    }

    fn scroll_document_to(&self, offset: ScrollRegion) {
        self.state.lock().document = offset;
    }

    fn scroll_region_to(&self, index: usize, offset: ScrollRegion) {
        if let Some(region) = self.state.lock().regions.get_mut(index) {
            *region = offset;
        }
    }

    fn scroll_into_view(&self, id: &str) -> bool {
        self.state.lock().into_view.push(id.to_string());
        true
    }
}
