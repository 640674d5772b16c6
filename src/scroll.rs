//! Scroll offsets: saved into the current history entry, replayed on restore.

use crate::error::Result;
use crate::history::{HistoryAdapter, ScrollRecord};
use crate::location::Location;
use crate::types::{Page, ScrollRegion};
use std::sync::Arc;
use url::Url;

/// DOM scroll primitives of the host.
///
/// Scroll regions are the host's registered scrollable elements, in
/// document order; offsets are matched to regions by index.
pub trait ScrollHost: Send + Sync {
    fn document_offset(&self) -> ScrollRegion;
    fn region_offsets(&self) -> Vec<ScrollRegion>;
    fn scroll_document_to(&self, offset: ScrollRegion);
    fn scroll_region_to(&self, index: usize, offset: ScrollRegion);

    /// Scroll the element with `id` into view. Returns false if there is none.
    fn scroll_into_view(&self, id: &str) -> bool;
}

/// Records and restores scroll offsets for page snapshots.
///
/// Restoring must only happen after the renderer committed the page.
pub struct ScrollManager {
    host: Arc<dyn ScrollHost>,
    history: Arc<HistoryAdapter>,
    location: Arc<dyn Location>,
}

impl ScrollManager {
    pub fn new(
        host: Arc<dyn ScrollHost>,
        history: Arc<HistoryAdapter>,
        location: Arc<dyn Location>,
    ) -> Self {
        Self {
            host,
            history,
            location,
        }
    }

    /// Record the current offsets into `page`'s history entry.
    pub fn save(&self, page: &Page) -> Result<()> {
        if let Some(entry) = self.history.current_entry() {
            if let Some(stored) = entry.direct_page() {
                if stored.url != page.url {
                    tracing::debug!(
                        page = %page.url,
                        entry = %stored.url,
                        "current history entry belongs to another page, not saving scroll"
                    );
                    return Ok(());
                }
            }
        }

        let record = ScrollRecord {
            document: self.host.document_offset(),
            regions: self.host.region_offsets(),
        };
        self.history.save_scroll(record)?;
        Ok(())
    }

    /// Replay the offsets saved for `page`.
    pub fn restore(&self, page: &Page) {
        let document = self
            .history
            .scroll_record()
            .map(|record| record.document)
            .unwrap_or(ScrollRegion::ORIGIN);
        self.host.scroll_document_to(document);

        let regions = self.host.region_offsets().len();
        for (index, offset) in page.scroll_regions.iter().enumerate().take(regions) {
            self.host.scroll_region_to(index, *offset);
        }
    }

    /// Scroll everything to the top, forget the old offsets, then jump to
    /// the location fragment if there is one.
    pub fn reset(&self, page: &Page) -> Result<()> {
        self.host.scroll_document_to(ScrollRegion::ORIGIN);
        for index in 0..self.host.region_offsets().len() {
            self.host.scroll_region_to(index, ScrollRegion::ORIGIN);
        }

        self.save(page)?;

        let href = self.location.href();
        if let Some(fragment) = Url::parse(&href).ok().and_then(|u| u.fragment().map(str::to_owned)) {
            if !fragment.is_empty() && !self.host.scroll_into_view(&fragment) {
                tracing::debug!(%fragment, "no element for location fragment");
            }
        }
        Ok(())
    }

    /// Scroll listener hook; only scroll regions are tracked.
    pub fn on_scroll(&self, page: &Page, is_region: bool) -> Result<()> {
        if is_region {
            self.save(page)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::history::MessagePackCodec;
    use crate::memory::{MemoryBrowser, MemoryScroll};

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn setup(href: &str) -> (Arc<MemoryBrowser>, Arc<MemoryScroll>, Arc<HistoryAdapter>, ScrollManager) {
        let browser = Arc::new(MemoryBrowser::new(href));
        let scroll = Arc::new(MemoryScroll::with_regions(2));
        let history = Arc::new(HistoryAdapter::new(
            browser.clone(),
            Arc::new(MessagePackCodec::new()),
            &RouterConfig::default(),
        ));
        let manager = ScrollManager::new(scroll.clone(), history.clone(), browser.clone());
        (browser, scroll, history, manager)
    }

    #[test]
    fn test_save_then_restore() {
        let (_, scroll, history, manager) = setup("http://app.test/");
        let page = Page::new("Feed", "http://app.test/feed");
        block_on(history.push_state(&page)).unwrap();

        scroll.scroll_document_to(ScrollRegion::new(300.0, 0.0));
        scroll.scroll_region_to(1, ScrollRegion::new(50.0, 10.0));
        manager.save(&page).unwrap();

        scroll.scroll_document_to(ScrollRegion::ORIGIN);
        scroll.scroll_region_to(1, ScrollRegion::ORIGIN);

        let entry = history.current_entry().unwrap();
        let restored = block_on(history.decrypt(&entry)).unwrap();
        manager.restore(&restored);

        assert_eq!(scroll.document_offset(), ScrollRegion::new(300.0, 0.0));
        assert_eq!(scroll.region_offsets()[1], ScrollRegion::new(50.0, 10.0));
    }

    #[test]
    fn test_reset_clears_offsets() {
        let (_, scroll, history, manager) = setup("http://app.test/");
        let page = Page::new("Feed", "http://app.test/feed");
        block_on(history.push_state(&page)).unwrap();

        scroll.scroll_document_to(ScrollRegion::new(300.0, 0.0));
        scroll.scroll_region_to(0, ScrollRegion::new(20.0, 0.0));
        manager.save(&page).unwrap();

        manager.reset(&page).unwrap();

        assert_eq!(scroll.document_offset(), ScrollRegion::ORIGIN);
        let record = history.scroll_record().unwrap();
        assert_eq!(record.document, ScrollRegion::ORIGIN);
        assert!(record.regions.iter().all(|r| *r == ScrollRegion::ORIGIN));
    }

    #[test]
    fn test_reset_scrolls_to_fragment() {
        let (_, scroll, history, manager) = setup("http://app.test/docs#install");
        let page = Page::new("Docs", "http://app.test/docs#install");
        block_on(history.push_state(&page)).unwrap();

        manager.reset(&page).unwrap();
        assert_eq!(scroll.scrolled_into_view(), vec!["install".to_string()]);
    }

    #[test]
    fn test_on_scroll_ignores_document_scrolls() {
        let (_, scroll, history, manager) = setup("http://app.test/");
        let page = Page::new("Feed", "http://app.test/feed");
        block_on(history.push_state(&page)).unwrap();

        scroll.scroll_region_to(0, ScrollRegion::new(5.0, 0.0));
        manager.on_scroll(&page, false).unwrap();
        assert!(history.scroll_record().unwrap().regions.is_empty());

        manager.on_scroll(&page, true).unwrap();
        assert_eq!(
            history.scroll_record().unwrap().regions[0],
            ScrollRegion::new(5.0, 0.0)
        );
    }
}
