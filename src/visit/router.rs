//! The router: visit orchestration.

use crate::config::{FallbackPolicy, RouterConfig};
use crate::error::{NavigationError, Result, TransportError};
use crate::events::{EventBus, EventName, EventOutcome, GlobalEvent, ListenerHandle};
use crate::history::{BrowserHistory, HistoryAdapter, MessagePackCodec, StateCodec};
use crate::href;
use crate::location::{Location, LocationVisit, NavigationType};
use crate::memory::{MemoryBrowser, MemoryScroll};
use crate::page::{PageStore, Renderer, SetOptions, SetOutcome};
use crate::popstate::{PopstateHandler, PopstateOutcome};
use crate::scroll::{ScrollHost, ScrollManager};
use crate::types::{Method, Page, PreserveOption, RawResponse};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::request::{ProgressReporter, Transport, VisitRequest};
use super::response::{self, ResponseKind};
use super::types::{
    ActiveSlot, ActiveVisit, PendingVisit, VisitCallbacks, VisitCanceller, VisitId, VisitOptions,
    VisitOutcome, VisitState, VisitStatus,
};

/// Host capabilities a router is built from.
pub struct RouterHosts {
    pub renderer: Arc<dyn Renderer>,
    pub transport: Arc<dyn Transport>,
    pub history: Arc<dyn BrowserHistory>,
    pub location: Arc<dyn Location>,
    pub scroll: Arc<dyn ScrollHost>,
    pub codec: Arc<dyn StateCodec>,
}

impl RouterHosts {
    /// Hosts backed by an in-memory browser and the default codec.
    pub fn memory(
        browser: Arc<MemoryBrowser>,
        scroll: Arc<MemoryScroll>,
        renderer: Arc<dyn Renderer>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            renderer,
            transport,
            history: browser.clone(),
            location: browser,
            scroll,
            codec: Arc::new(MessagePackCodec::new()),
        }
    }
}

/// Orchestrates visits end to end.
///
/// At most one visit is active at a time. Starting a visit interrupts the
/// active one (its token fires, `cancel` and `finish` are raised) before
/// the new request is dispatched, so the last navigation wins.
pub struct Router {
    config: RouterConfig,
    events: Arc<EventBus>,
    pages: Arc<PageStore>,
    history: Arc<HistoryAdapter>,
    scroll: Arc<ScrollManager>,
    popstate: PopstateHandler,
    location: Arc<dyn Location>,
    transport: Arc<dyn Transport>,
    active: Arc<ActiveSlot>,
    next_visit: AtomicU64,
}

impl Router {
    /// Create a router showing `initial`. Call [`init`](Self::init) before
    /// the first visit.
    pub fn new(initial: Page, hosts: RouterHosts, config: RouterConfig) -> Self {
        let events = Arc::new(EventBus::with_stream_buffer(config.event_stream_buffer));
        let history = Arc::new(HistoryAdapter::new(hosts.history, hosts.codec, &config));
        let pages = Arc::new(PageStore::new(
            initial,
            hosts.renderer,
            Arc::clone(&history),
            Arc::clone(&hosts.location),
            Arc::clone(&events),
        ));
        let scroll = Arc::new(ScrollManager::new(
            hosts.scroll,
            Arc::clone(&history),
            Arc::clone(&hosts.location),
        ));
        let popstate = PopstateHandler::new(
            Arc::clone(&pages),
            Arc::clone(&history),
            Arc::clone(&scroll),
            Arc::clone(&events),
            Arc::clone(&hosts.location),
        );

        Self {
            config,
            events,
            pages,
            history,
            scroll,
            popstate,
            location: hosts.location,
            transport: hosts.transport,
            active: Arc::new(Mutex::new(None)),
            next_visit: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn pages(&self) -> &Arc<PageStore> {
        &self.pages
    }

    pub fn history(&self) -> &Arc<HistoryAdapter> {
        &self.history
    }

    pub fn scroll(&self) -> &Arc<ScrollManager> {
        &self.scroll
    }

    /// The current page snapshot.
    pub fn page(&self) -> Arc<Page> {
        self.pages.get()
    }

    /// Register a global event listener.
    pub fn on<F>(&self, name: EventName, callback: F) -> ListenerHandle
    where
        F: Fn(&GlobalEvent) -> EventOutcome + Send + Sync + 'static,
    {
        self.events.on(name, callback)
    }

    /// Descriptor of the visit in flight, if any.
    pub fn active_visit(&self) -> Option<PendingVisit> {
        self.active.lock().as_ref().map(|active| active.visit.clone())
    }

    /// Apply the initial page, restoring from history after a back/forward
    /// load or a location visit.
    pub async fn init(&self) -> Result<()> {
        if self.location.navigation_type() == NavigationType::BackForward
            && self.init_from_history().await?
        {
            return Ok(());
        }

        if let Some(marker) = self.location.take_location_visit() {
            return self.init_after_location_visit(marker).await;
        }

        let mut page = (*self.pages.get()).clone();
        page.url = href::with_location_fragment(&page.url, &self.location.href());
        let outcome = self
            .pages
            .set(page, SetOptions::default().replace(true).preserve_state(true))
            .await?;
        self.announce(&outcome);
        Ok(())
    }

    async fn init_from_history(&self) -> Result<bool> {
        let Some(entry) = self.history.current_entry() else {
            return Ok(false);
        };
        let page = match self.history.decrypt(&entry).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "cannot restore back/forward entry, using initial page");
                return Ok(false);
            }
        };

        let outcome = self
            .pages
            .set_quietly(page, SetOptions::default().preserve_state(true))
            .await?;
        if let Some(page) = outcome.page() {
            self.scroll.restore(page);
        }
        self.announce(&outcome);
        Ok(true)
    }

    async fn init_after_location_visit(&self, marker: LocationVisit) -> Result<()> {
        let mut page = (*self.pages.get()).clone();
        if let Some(stored) = self.stored_page().await {
            page.remembered_state = stored.remembered_state;
            page.scroll_regions = stored.scroll_regions;
        }
        page.url = href::with_location_fragment(&page.url, &self.location.href());

        let outcome = self
            .pages
            .set(page, SetOptions::default().replace(true).preserve_state(true))
            .await?;
        if let (true, Some(page)) = (marker.preserve_scroll, outcome.page()) {
            self.scroll.restore(page);
        }
        self.announce(&outcome);
        Ok(())
    }

    fn announce(&self, outcome: &SetOutcome) {
        if let Some(page) = outcome.page() {
            self.events.fire(&GlobalEvent::Navigate {
                page: Arc::clone(page),
            });
        }
    }

    /// Visit `url`.
    ///
    /// Returns `Err` only for programmer errors such as an unparsable URL.
    /// Every runtime outcome, including transport failures, is a
    /// [`VisitOutcome`].
    pub async fn visit(&self, url: &str, options: VisitOptions) -> Result<VisitOutcome> {
        let target = href::resolve(&self.location.href(), url)?;
        let (target, data) =
            href::merge_data_into_query(options.method, target, options.data, options.array_format);

        let visit = PendingVisit {
            id: VisitId(self.next_visit.fetch_add(1, Ordering::SeqCst)),
            url: target,
            method: options.method,
            data,
            headers: options.headers,
            only: options.only,
            error_bag: options.error_bag,
            preserve_scroll: options.preserve_scroll,
            preserve_state: options.preserve_state.unwrap_or_default(),
            replace: options.replace,
            status: VisitStatus::new(),
        };
        let callbacks = Arc::new(options.callbacks);

        if let Some(on_before) = &callbacks.on_before {
            if on_before(&visit).is_veto() {
                tracing::debug!(visit_id = visit.id.0, "visit vetoed by callback");
                return Ok(VisitOutcome::Vetoed);
            }
        }
        if self
            .events
            .fire(&GlobalEvent::Before {
                visit: visit.clone(),
            })
            .is_veto()
        {
            tracing::debug!(visit_id = visit.id.0, "visit vetoed by listener");
            return Ok(VisitOutcome::Vetoed);
        }

        self.interrupt_active();
        self.save_scroll();

        let token = CancellationToken::new();
        visit.status.transition(VisitState::Active);
        *self.active.lock() = Some(ActiveVisit {
            visit: visit.clone(),
            token: token.clone(),
            callbacks: Arc::clone(&callbacks),
        });

        if let Some(on_cancel_token) = &callbacks.on_cancel_token {
            on_cancel_token(VisitCanceller {
                id: visit.id,
                slot: Arc::downgrade(&self.active),
            });
        }

        self.events.fire(&GlobalEvent::Start {
            visit: visit.clone(),
        });
        if let Some(on_start) = &callbacks.on_start {
            on_start(&visit);
        }

        tracing::info!(
            visit_id = visit.id.0,
            method = %visit.method,
            url = %visit.url,
            "visit started"
        );

        let request = VisitRequest::build(&visit, &self.pages.get());
        let progress = self.progress_reporter(&callbacks);

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.transport.dispatch(request, progress, token.clone()) => Some(result),
        };

        let outcome = match response {
            None | Some(Err(TransportError::Aborted)) if token.is_cancelled() => {
                self.stopped(&visit)
            }
            None => self.stopped(&visit),
            Some(Err(e)) => self.exception(&visit, NavigationError::Transport(e)),
            Some(Ok(response)) => self.handle_response(&visit, &callbacks, &token, response).await,
        };

        self.finish(&visit, &callbacks, &outcome);
        Ok(outcome)
    }

    pub async fn get(&self, url: &str, data: Value, options: VisitOptions) -> Result<VisitOutcome> {
        self.visit(url, options.method(Method::Get).data(data)).await
    }

    pub async fn post(&self, url: &str, data: Value, options: VisitOptions) -> Result<VisitOutcome> {
        self.mutate(Method::Post, url, data, options).await
    }

    pub async fn put(&self, url: &str, data: Value, options: VisitOptions) -> Result<VisitOutcome> {
        self.mutate(Method::Put, url, data, options).await
    }

    pub async fn patch(&self, url: &str, data: Value, options: VisitOptions) -> Result<VisitOutcome> {
        self.mutate(Method::Patch, url, data, options).await
    }

    pub async fn delete(&self, url: &str, options: VisitOptions) -> Result<VisitOutcome> {
        self.mutate(Method::Delete, url, Value::Object(Map::new()), options)
            .await
    }

    /// Visit the current URL again, keeping scroll and state.
    pub async fn reload(&self, options: VisitOptions) -> Result<VisitOutcome> {
        let url = self.location.href();
        let options = options.preserve_scroll(true).preserve_state(true);
        self.visit(&url, options).await
    }

    /// Visit `url`, replacing the current history entry.
    pub async fn replace(&self, url: &str, mut options: VisitOptions) -> Result<VisitOutcome> {
        if options.preserve_state.is_none() {
            options.preserve_state = Some(PreserveOption::Bool(true));
        }
        self.visit(url, options.replace(true)).await
    }

    async fn mutate(
        &self,
        method: Method,
        url: &str,
        data: Value,
        mut options: VisitOptions,
    ) -> Result<VisitOutcome> {
        if options.preserve_state.is_none() {
            options.preserve_state = Some(PreserveOption::Bool(true));
        }
        self.visit(url, options.method(method).data(data)).await
    }

    /// Cancel the active visit, if any.
    pub fn cancel(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(active) => {
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Handle a back/forward event carrying `state`.
    pub async fn popstate(&self, state: Option<Value>) -> PopstateOutcome {
        self.popstate.handle(state).await
    }

    /// Store `data` under `key` in the current page's remembered state.
    ///
    /// Ignored while the page store is cleared.
    pub async fn remember(&self, data: Value, key: &str) -> Result<()> {
        if self.pages.is_cleared() {
            tracing::debug!(key, "page store cleared, not remembering state");
            return Ok(());
        }
        let mut page = (*self.pages.get()).clone();
        page.remembered_state.insert(key.to_string(), data);
        self.pages.amend(page).await?;
        Ok(())
    }

    /// Remembered state stored under `key` in the current history entry.
    pub async fn restore(&self, key: &str) -> Option<Value> {
        self.stored_page()
            .await
            .and_then(|page| page.remembered_state.get(key).cloned())
    }

    /// Scroll listener hook.
    pub fn on_scroll(&self, is_region: bool) -> Result<()> {
        if self.pages.is_cleared() {
            return Ok(());
        }
        self.scroll.on_scroll(&self.pages.get(), is_region)
    }

    /// The page stored in the current history entry.
    async fn stored_page(&self) -> Option<Page> {
        let entry = self.history.current_entry()?;
        match self.history.decrypt(&entry).await {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::debug!(error = %e, "current history entry not restorable");
                None
            }
        }
    }

    fn interrupt_active(&self) {
        let previous = self.active.lock().take();
        let Some(previous) = previous else {
            return;
        };
        if !previous.visit.status.transition(VisitState::Interrupted) {
            return;
        }

        previous.token.cancel();
        tracing::debug!(visit_id = previous.visit.id.0, "visit interrupted");
        self.fire_cancel(&previous.visit, &previous.callbacks);
    }

    fn fire_cancel(&self, visit: &PendingVisit, callbacks: &VisitCallbacks) {
        self.events.fire(&GlobalEvent::Cancel);
        if let Some(on_cancel) = &callbacks.on_cancel {
            on_cancel();
        }
        self.fire_finish(visit, callbacks);
    }

    fn fire_finish(&self, visit: &PendingVisit, callbacks: &VisitCallbacks) {
        self.events.fire(&GlobalEvent::Finish {
            visit: visit.clone(),
        });
        if let Some(on_finish) = &callbacks.on_finish {
            on_finish(visit);
        }
    }

    fn save_scroll(&self) {
        if self.pages.is_cleared() {
            tracing::debug!("page store cleared, not saving scroll");
            return;
        }
        if let Err(e) = self.scroll.save(&self.pages.get()) {
            tracing::warn!(error = %e, "failed to save scroll position");
        }
    }

    fn progress_reporter(&self, callbacks: &Arc<VisitCallbacks>) -> ProgressReporter {
        let events = Arc::clone(&self.events);
        let callbacks = Arc::clone(callbacks);
        ProgressReporter::new(move |progress| {
            events.fire(&GlobalEvent::Progress { progress });
            if let Some(on_progress) = &callbacks.on_progress {
                on_progress(progress);
            }
        })
    }

    /// Outcome for a visit whose token fired.
    fn stopped(&self, visit: &PendingVisit) -> VisitOutcome {
        if visit.status.is_interrupted() {
            VisitOutcome::Interrupted
        } else {
            VisitOutcome::Cancelled
        }
    }

    /// Settle the visit's terminal state and raise the closing events.
    fn finish(&self, visit: &PendingVisit, callbacks: &VisitCallbacks, outcome: &VisitOutcome) {
        {
            let mut active = self.active.lock();
            if active.as_ref().map(|a| a.visit.id) == Some(visit.id) {
                *active = None;
            }
        }

        match outcome {
            // The interrupting visit already raised cancel and finish.
            VisitOutcome::Interrupted | VisitOutcome::Vetoed => {}
            VisitOutcome::Cancelled => {
                if visit.status.transition(VisitState::Cancelled) {
                    tracing::debug!(visit_id = visit.id.0, "visit cancelled");
                    self.fire_cancel(visit, callbacks);
                }
            }
            _ => {
                if visit.status.transition(VisitState::Completed) {
                    tracing::debug!(visit_id = visit.id.0, "visit completed");
                    self.fire_finish(visit, callbacks);
                }
            }
        }
    }

    async fn handle_response(
        &self,
        visit: &PendingVisit,
        callbacks: &VisitCallbacks,
        token: &CancellationToken,
        response: RawResponse,
    ) -> VisitOutcome {
        let current = self.pages.get();

        match response::classify(&response) {
            ResponseKind::Location(location) => {
                match href::resolve(&self.location.href(), &location) {
                    Ok(url) => self.location_visit(url, visit.preserve_scroll.is_true()),
                    Err(e) => self.exception(visit, e.into()),
                }
            }
            ResponseKind::Invalid => self.invalid(visit, response),
            ResponseKind::Page(page) if response::is_version_mismatch(&current, &page) => {
                tracing::info!(
                    visit_id = visit.id.0,
                    current = ?current.version,
                    incoming = ?page.version,
                    "asset version changed"
                );
                let url = href::resolve(&self.location.href(), &page.url)
                    .unwrap_or_else(|_| visit.url.clone());
                self.location_visit(url, visit.preserve_scroll.is_true())
            }
            ResponseKind::Page(page) => {
                self.apply_page(visit, callbacks, token, &current, page)
                    .await
            }
        }
    }

    /// Apply a page response. On a pushing set the store fires `navigate`
    /// before `success` is raised here.
    async fn apply_page(
        &self,
        visit: &PendingVisit,
        callbacks: &VisitCallbacks,
        token: &CancellationToken,
        current: &Page,
        mut page: Page,
    ) -> VisitOutcome {
        if visit.is_partial() && page.is_same_component(current) {
            page.props = current.merge_props(&page.props);
        }

        let preserve_scroll = visit.preserve_scroll.resolve(&page);
        let preserve_state = visit.preserve_state.resolve(&page);

        if preserve_state && page.is_same_component(current) {
            if let Some(stored) = self.stored_page().await {
                page.remembered_state = stored.remembered_state;
            }
        }

        if let Ok(response_url) = href::resolve(&self.location.href(), &page.url) {
            let carried = href::carry_fragment(&visit.url, &response_url);
            if carried.fragment() != response_url.fragment() {
                page.url = href::with_fragment(&page.url, carried.fragment());
            }
        }

        let options = SetOptions::default()
            .replace(visit.replace)
            .preserve_state(preserve_state)
            .cancel_token(token.clone());

        let page = match self.pages.set(page, options).await {
            Ok(SetOutcome::Applied { page, .. }) => page,
            Ok(SetOutcome::Stale) => return self.stopped(visit),
            Err(e) => return self.exception(visit, e),
        };
        if !visit.status.is_active() {
            return self.stopped(visit);
        }

        if !preserve_scroll {
            if let Err(e) = self.scroll.reset(&page) {
                tracing::warn!(error = %e, "failed to reset scroll");
            }
        }

        if page.has_errors() {
            let errors = page.scoped_errors(visit.error_bag.as_deref());
            tracing::debug!(visit_id = visit.id.0, fields = errors.len(), "validation errors");
            self.events.fire(&GlobalEvent::Error {
                errors: errors.clone(),
            });
            if let Some(on_error) = &callbacks.on_error {
                on_error(&errors);
            }
            VisitOutcome::ValidationFailed(errors)
        } else {
            self.events.fire(&GlobalEvent::Success {
                page: Arc::clone(&page),
            });
            if let Some(on_success) = &callbacks.on_success {
                on_success(&page);
            }
            VisitOutcome::Succeeded(page)
        }
    }

    fn invalid(&self, visit: &PendingVisit, response: RawResponse) -> VisitOutcome {
        tracing::warn!(
            visit_id = visit.id.0,
            status = response.status,
            "response is not a valid page"
        );
        let vetoed = self
            .events
            .fire(&GlobalEvent::Invalid { response })
            .is_veto();
        VisitOutcome::Invalid {
            reloaded: !vetoed && self.fall_back(&visit.url),
        }
    }

    fn exception(&self, visit: &PendingVisit, error: NavigationError) -> VisitOutcome {
        tracing::warn!(visit_id = visit.id.0, error = %error, "visit failed");
        let error = Arc::new(error);
        let vetoed = self
            .events
            .fire(&GlobalEvent::Exception {
                error: Arc::clone(&error),
            })
            .is_veto();
        VisitOutcome::Exception {
            error,
            reloaded: !vetoed && self.fall_back(&visit.url),
        }
    }

    /// Apply the configured fallback for an unvetoed failure.
    fn fall_back(&self, url: &Url) -> bool {
        match self.config.fallback {
            FallbackPolicy::FullReload => {
                self.load(url, false);
                true
            }
            FallbackPolicy::Surface => false,
        }
    }

    fn location_visit(&self, url: Url, preserve_scroll: bool) -> VisitOutcome {
        self.load(&url, preserve_scroll);
        VisitOutcome::LocationVisit(url)
    }

    /// Full-page load of `url`. Reloads when only the fragment differs,
    /// since assigning such a URL does not leave the document.
    fn load(&self, url: &Url, preserve_scroll: bool) {
        if let Err(e) = self
            .location
            .stash_location_visit(LocationVisit { preserve_scroll })
        {
            tracing::warn!(error = %e, "failed to stash location visit");
        }

        tracing::info!(url = %url, "full page load");
        self.location.assign(url.as_str());

        let same_document = Url::parse(&self.location.href())
            .map(|current| href::same_document(&current, url))
            .unwrap_or(false);
        if same_document {
            self.location.reload();
        }
    }
}
