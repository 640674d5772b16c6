//! History adapter: writes page snapshots into the browser's session history.

use crate::config::RouterConfig;
use crate::error::{NavigationError, Result};
use crate::types::{Hash, Page, ScrollRegion};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::codec::StateCodec;
use super::entry::{EntryPayload, HistoryEntry, ScrollRecord, ENTRY_FORMAT};

/// Host session-history stack (`window.history` in a browser).
pub trait BrowserHistory: Send + Sync {
    /// State of the current entry, if any.
    fn state(&self) -> Option<Value>;

    /// Push a new entry. Hosts may reject oversized states.
    fn push_state(&self, state: Value, url: &str) -> Result<()>;

    /// Replace the current entry. `None` keeps the current URL.
    fn replace_state(&self, state: Value, url: Option<&str>) -> Result<()>;
}

/// Base64 text of an encoded page snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedState(pub String);

/// A history write prepared by [`HistoryAdapter::stage`].
#[derive(Clone, Debug)]
pub struct StagedEntry {
    url: String,
    payload: EntryPayload,
    regions: Vec<ScrollRegion>,
    replace: bool,
    bytes: usize,
}

impl StagedEntry {
    pub fn is_encoded(&self) -> bool {
        self.payload.is_encoded()
    }

    /// Size of the staged payload in bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

/// Keeps the session-history stack in sync with page snapshots.
pub struct HistoryAdapter {
    browser: Arc<dyn BrowserHistory>,
    codec: Arc<dyn StateCodec>,
    max_direct_bytes: usize,
    encrypt_always: bool,
    epoch: AtomicU64,
    next_seq: AtomicU64,
    /// Decoded blobs by content hash. Entries are immutable, so hits are exact.
    decoded: Mutex<LruCache<Hash, Page>>,
}

impl HistoryAdapter {
    pub fn new(
        browser: Arc<dyn BrowserHistory>,
        codec: Arc<dyn StateCodec>,
        config: &RouterConfig,
    ) -> Self {
        let cache_size =
            NonZeroUsize::new(config.decode_cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        // Continue after whatever entry is current (e.g. after a reload).
        let (current_epoch, current_seq) = browser
            .state()
            .as_ref()
            .and_then(HistoryEntry::parse)
            .map(|entry| (entry.epoch, entry.seq))
            .unwrap_or((0, 0));

        Self {
            browser,
            codec,
            max_direct_bytes: config.max_direct_state_bytes,
            encrypt_always: config.encrypt_history,
            epoch: AtomicU64::new(current_epoch),
            next_seq: AtomicU64::new(current_seq + 1),
            decoded: Mutex::new(LruCache::new(cache_size)),
        }
    }

    /// Whether a raw history state was written by this adapter's format.
    pub fn is_valid_state(raw: &Value) -> bool {
        HistoryEntry::parse(raw).is_some()
    }

    /// The current entry, if the host's state is one of ours.
    pub fn current_entry(&self) -> Option<HistoryEntry> {
        self.browser.state().as_ref().and_then(HistoryEntry::parse)
    }

    /// Current history epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Push a new entry for `page`.
    pub async fn push_state(&self, page: &Page) -> Result<()> {
        self.write(page, false).await
    }

    /// Replace the current entry with `page`, keeping its tag and scroll record.
    pub async fn replace_state(&self, page: &Page) -> Result<()> {
        self.write(page, true).await
    }

    /// Serialize (and encode, if needed) `page` for a later [`commit`](Self::commit).
    ///
    /// Nothing is written to the host; all of the asynchronous work of a
    /// history write happens here.
    pub async fn stage(&self, page: &Page, replace: bool) -> Result<StagedEntry> {
        let bytes = serde_json::to_vec(page)?.len();
        if self.encrypt_always || bytes > self.max_direct_bytes {
            tracing::debug!(url = %page.url, bytes, "storing encoded history state");
            return self.stage_encoded(page, replace).await;
        }

        Ok(StagedEntry {
            url: page.url.clone(),
            payload: EntryPayload::Direct { page: page.clone() },
            regions: page.scroll_regions.clone(),
            replace,
            bytes,
        })
    }

    /// Stage `page` through the state codec regardless of its size.
    pub async fn stage_encoded(&self, page: &Page, replace: bool) -> Result<StagedEntry> {
        let EncodedState(blob) = self.encrypt(page).await?;
        Ok(StagedEntry {
            url: page.url.clone(),
            bytes: blob.len(),
            payload: EntryPayload::Encoded { blob },
            regions: page.scroll_regions.clone(),
            replace,
        })
    }

    /// Write a staged entry. Synchronous: the host sees the entry before
    /// this returns.
    ///
    /// A replace keeps the current entry's tag and scroll record if it was
    /// written in this epoch.
    pub fn commit(&self, staged: StagedEntry) -> Result<()> {
        let epoch = self.epoch();
        let current = self
            .current_entry()
            .filter(|entry| staged.replace && entry.epoch == epoch);

        let (seq, scroll) = match current {
            Some(entry) => {
                let scroll = if staged.regions.is_empty() {
                    entry.scroll
                } else {
                    ScrollRecord {
                        regions: staged.regions,
                        ..entry.scroll
                    }
                };
                (entry.seq, scroll)
            }
            None => (
                self.next_seq.fetch_add(1, Ordering::SeqCst),
                ScrollRecord {
                    regions: staged.regions,
                    ..ScrollRecord::default()
                },
            ),
        };

        let entry = HistoryEntry {
            format: ENTRY_FORMAT,
            epoch,
            seq,
            payload: staged.payload,
            scroll,
        };
        self.put(entry.to_value()?, &staged.url, staged.replace)
    }

    /// Overwrite the scroll record of the current entry.
    ///
    /// Returns false when the current state is not one of ours.
    pub fn save_scroll(&self, scroll: ScrollRecord) -> Result<bool> {
        let Some(mut entry) = self.current_entry() else {
            return Ok(false);
        };
        if entry.scroll == scroll {
            return Ok(true);
        }

        entry.scroll = scroll;
        self.browser.replace_state(entry.to_value()?, None)?;
        Ok(true)
    }

    /// Scroll record of the current entry.
    pub fn scroll_record(&self) -> Option<ScrollRecord> {
        self.current_entry().map(|entry| entry.scroll)
    }

    /// Encode `page` through the state codec.
    pub async fn encrypt(&self, page: &Page) -> Result<EncodedState> {
        let value = serde_json::to_value(page)?;
        let blob = self.codec.encode(&value).await?;
        Ok(EncodedState(BASE64.encode(blob)))
    }

    /// Recover the page stored in `entry`.
    ///
    /// Fails for entries of a cleared epoch and for undecodable blobs;
    /// callers treat any failure as a missing history entry.
    pub async fn decrypt(&self, entry: &HistoryEntry) -> Result<Page> {
        let current = self.epoch();
        if entry.epoch != current {
            return Err(NavigationError::ExpiredEntry {
                entry: entry.epoch,
                current,
            });
        }

        let mut page = match &entry.payload {
            EntryPayload::Direct { page } => page.clone(),
            EntryPayload::Encoded { blob } => self.decode_blob(blob).await?,
        };
        page.scroll_regions = entry.scroll.regions.clone();
        Ok(page)
    }

    /// Start a new epoch. Entries written before are no longer restorable.
    pub fn clear(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.decoded.lock().clear();
        tracing::info!(epoch, "history cleared");
    }

    async fn decode_blob(&self, blob: &str) -> Result<Page> {
        let bytes = BASE64.decode(blob)?;
        let hash = Hash::from_bytes(&bytes);

        let cached = self.decoded.lock().get(&hash).cloned();
        if let Some(page) = cached {
            return Ok(page);
        }

        let value = self.codec.decode(&bytes).await?;
        let page: Page = serde_json::from_value(value)
            .map_err(|e| NavigationError::Deserialization(e.to_string()))?;

        tracing::debug!(hash = %hash, "decoded history blob");
        self.decoded.lock().put(hash, page.clone());
        Ok(page)
    }

    async fn write(&self, page: &Page, replace: bool) -> Result<()> {
        let staged = self.stage(page, replace).await?;
        let encoded = staged.is_encoded();
        let bytes = staged.bytes;

        match self.commit(staged) {
            Err(NavigationError::HistoryRejected(reason)) if !encoded => {
                tracing::warn!(
                    url = %page.url,
                    bytes,
                    %reason,
                    "host rejected direct history state, encoding"
                );
                let staged = self.stage_encoded(page, replace).await?;
                self.commit(staged)
            }
            result => result,
        }
    }

    fn put(&self, state: Value, url: &str, replace: bool) -> Result<()> {
        if replace {
            self.browser.replace_state(state, Some(url))
        } else {
            self.browser.push_state(state, url)
        }
    }
}
