//! Page store implementation.

use crate::error::{NavigationError, Result};
use crate::events::{EventBus, GlobalEvent};
use crate::history::HistoryAdapter;
use crate::href;
use crate::location::Location;
use crate::types::{Page, RenderHandle};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::renderer::Renderer;

/// Options for [`PageStore::set`] and [`PageStore::set_quietly`].
#[derive(Clone, Debug, Default)]
pub struct SetOptions {
    /// Replace the current history entry instead of pushing.
    pub replace: bool,

    /// Keep component-local state across the swap.
    pub preserve_state: bool,

    /// Token of the visit applying this page. A cancelled token turns the
    /// set into a no-op.
    pub cancel: Option<CancellationToken>,
}

impl SetOptions {
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn preserve_state(mut self, preserve_state: bool) -> Self {
        self.preserve_state = preserve_state;
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}

/// Result of a set operation.
#[derive(Clone, Debug)]
pub enum SetOutcome {
    Applied {
        page: Arc<Page>,
        /// Whether the history entry was replaced rather than pushed.
        replaced: bool,
    },
    /// The owning visit was cancelled before the page could be applied.
    Stale,
}

impl SetOutcome {
    pub fn page(&self) -> Option<&Arc<Page>> {
        match self {
            SetOutcome::Applied { page, .. } => Some(page),
            SetOutcome::Stale => None,
        }
    }
}

/// Holds the single current page snapshot.
pub struct PageStore {
    current: RwLock<Arc<Page>>,
    cleared: AtomicBool,
    handle: Mutex<Option<RenderHandle>>,
    /// Serializes apply steps.
    apply: tokio::sync::Mutex<()>,
    renderer: Arc<dyn Renderer>,
    history: Arc<HistoryAdapter>,
    location: Arc<dyn Location>,
    events: Arc<EventBus>,
}

impl PageStore {
    /// Create a store holding `initial`. Nothing is rendered until the first set.
    pub fn new(
        initial: Page,
        renderer: Arc<dyn Renderer>,
        history: Arc<HistoryAdapter>,
        location: Arc<dyn Location>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            cleared: AtomicBool::new(false),
            handle: Mutex::new(None),
            apply: tokio::sync::Mutex::new(()),
            renderer,
            history,
            location,
            events,
        }
    }

    /// The current snapshot.
    pub fn get(&self) -> Arc<Page> {
        Arc::clone(&self.current.read())
    }

    /// Whether the store was cleared and has not received a page since.
    pub fn is_cleared(&self) -> bool {
        self.cleared.load(Ordering::SeqCst)
    }

    /// Mark the current snapshot invalid. The next set proceeds normally.
    pub fn clear(&self) {
        self.cleared.store(true, Ordering::SeqCst);
        tracing::debug!("page store cleared");
    }

    /// Apply `page`: render, write history (push or replace), and fire
    /// `navigate` when a new entry was pushed.
    ///
    /// A page whose URL equals the current location (ignoring fragment)
    /// always replaces, so retried visits never stack duplicate entries.
    ///
    /// The token is checked again once the renderer settles. A visit
    /// cancelled while its page was rendering leaves history and the
    /// snapshot untouched; nothing after that check suspends.
    pub async fn set(&self, page: Page, options: SetOptions) -> Result<SetOutcome> {
        let _apply = self.apply.lock().await;
        if options.is_cancelled() {
            return Ok(SetOutcome::Stale);
        }

        let replace = options.replace || self.is_current_location(&page.url);
        let staged = self.history.stage(&page, replace).await?;
        self.render(&page, options.preserve_state).await?;

        if options.is_cancelled() {
            tracing::debug!(url = %page.url, "visit cancelled during render, page dropped");
            return Ok(SetOutcome::Stale);
        }

        let encoded = staged.is_encoded();
        match self.history.commit(staged) {
            Ok(()) => {}
            Err(NavigationError::HistoryRejected(reason)) if !encoded => {
                tracing::warn!(
                    url = %page.url,
                    %reason,
                    "host rejected direct history state, encoding"
                );
                let staged = self.history.stage_encoded(&page, replace).await?;
                // Nothing was written yet, so a cancellation here is still clean.
                if options.is_cancelled() {
                    return Ok(SetOutcome::Stale);
                }
                self.history.commit(staged)?;
            }
            Err(e) => return Err(e),
        }

        let page = Arc::new(page);
        self.commit(Arc::clone(&page));

        tracing::debug!(
            component = %page.component,
            url = %page.url,
            replace,
            "page applied"
        );

        if !replace {
            self.events.fire(&GlobalEvent::Navigate {
                page: Arc::clone(&page),
            });
        }

        Ok(SetOutcome::Applied {
            page,
            replaced: replace,
        })
    }

    /// Apply `page` without touching history.
    pub async fn set_quietly(&self, page: Page, options: SetOptions) -> Result<SetOutcome> {
        let _apply = self.apply.lock().await;
        if options.is_cancelled() {
            return Ok(SetOutcome::Stale);
        }

        self.render(&page, options.preserve_state).await?;
        if options.is_cancelled() {
            return Ok(SetOutcome::Stale);
        }

        let page = Arc::new(page);
        self.commit(Arc::clone(&page));

        Ok(SetOutcome::Applied {
            page,
            replaced: true,
        })
    }

    /// Swap in `page` and replace the current history entry without
    /// re-rendering. Used for metadata-only changes: remembered state and
    /// location fragments.
    ///
    /// Returns `None` without writing anything while the store is cleared:
    /// the snapshot no longer matches the entry the browser is showing.
    pub async fn amend(&self, page: Page) -> Result<Option<Arc<Page>>> {
        let _apply = self.apply.lock().await;
        if self.is_cleared() {
            tracing::debug!(url = %page.url, "page store cleared, not amending history");
            return Ok(None);
        }
        self.history.replace_state(&page).await?;

        let page = Arc::new(page);
        self.commit(Arc::clone(&page));
        Ok(Some(page))
    }

    fn commit(&self, page: Arc<Page>) {
        *self.current.write() = page;
        self.cleared.store(false, Ordering::SeqCst);
    }

    fn is_current_location(&self, url: &str) -> bool {
        let location = self.location.href();
        match (href::resolve(&location, url), href::resolve(&location, &location)) {
            (Ok(target), Ok(current)) => href::same_document(&target, &current),
            _ => false,
        }
    }

    async fn render(&self, page: &Page, preserve_state: bool) -> Result<()> {
        let handle = *self.handle.lock();
        match handle {
            Some(handle) => self.renderer.update(handle, page, preserve_state).await,
            None => {
                let handle = self.renderer.mount(page).await?;
                *self.handle.lock() = Some(handle);
                Ok(())
            }
        }
    }
}
