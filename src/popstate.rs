//! Back/forward handling.
//!
//! Bridges the host's `popstate` events into the page store. Nothing in
//! here returns an error: an entry that cannot be restored clears the store
//! and raises [`InternalEvent::MissingHistoryItem`] instead.

use crate::events::{EventBus, GlobalEvent, InternalEvent};
use crate::history::{HistoryAdapter, HistoryEntry};
use crate::href;
use crate::location::Location;
use crate::page::{PageStore, SetOptions, SetOutcome};
use crate::scroll::ScrollManager;
use crate::types::Page;
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;

/// What a popstate event resolved to.
#[derive(Clone, Debug, PartialEq)]
pub enum PopstateOutcome {
    /// The entry had no state; the current page was written back into it.
    Rebuilt,
    /// The entry's page was restored.
    Restored(Arc<Page>),
    /// The entry was foreign, expired or undecodable, or the store is
    /// cleared and has nothing to rebuild from.
    Missing,
}

pub struct PopstateHandler {
    pages: Arc<PageStore>,
    history: Arc<HistoryAdapter>,
    scroll: Arc<ScrollManager>,
    events: Arc<EventBus>,
    location: Arc<dyn Location>,
}

impl PopstateHandler {
    pub fn new(
        pages: Arc<PageStore>,
        history: Arc<HistoryAdapter>,
        scroll: Arc<ScrollManager>,
        events: Arc<EventBus>,
        location: Arc<dyn Location>,
    ) -> Self {
        Self {
            pages,
            history,
            scroll,
            events,
            location,
        }
    }

    /// Handle a `popstate` event carrying `state`.
    pub async fn handle(&self, state: Option<Value>) -> PopstateOutcome {
        let Some(raw) = state else {
            return self.rebuild().await;
        };

        let Some(entry) = HistoryEntry::parse(&raw) else {
            return self.missing("foreign history state");
        };

        match self.history.decrypt(&entry).await {
            Ok(page) => self.restore(page).await,
            Err(e) => self.missing(e),
        }
    }

    /// No state: history was replaced externally (e.g. an anchor jump).
    async fn rebuild(&self) -> PopstateOutcome {
        let mut page = (*self.pages.get()).clone();
        page.url = href::with_location_fragment(&page.url, &self.location.href());

        match self.pages.amend(page).await {
            Ok(Some(page)) => {
                if let Err(e) = self.scroll.reset(&page) {
                    tracing::warn!(error = %e, "failed to reset scroll after popstate");
                }
            }
            // Cleared store: there is no page to rebuild from.
            Ok(None) => return PopstateOutcome::Missing,
            Err(e) => tracing::warn!(error = %e, "failed to rebuild history entry"),
        }

        PopstateOutcome::Rebuilt
    }

    async fn restore(&self, page: Page) -> PopstateOutcome {
        match self.pages.set_quietly(page, SetOptions::default()).await {
            Ok(SetOutcome::Applied { page, .. }) => {
                self.scroll.restore(&page);
                self.events.fire(&GlobalEvent::Navigate {
                    page: Arc::clone(&page),
                });
                tracing::debug!(url = %page.url, "restored page from history");
                PopstateOutcome::Restored(page)
            }
            Ok(SetOutcome::Stale) => PopstateOutcome::Missing,
            Err(e) => self.missing(e),
        }
    }

    fn missing(&self, reason: impl Display) -> PopstateOutcome {
        tracing::warn!(%reason, "history entry missing, clearing page store");
        self.pages.clear();
        self.events.fire_internal(InternalEvent::MissingHistoryItem);
        PopstateOutcome::Missing
    }
}
