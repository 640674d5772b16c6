//! Shared doubles for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use pageturn::memory::{MemoryBrowser, MemoryScroll};
use pageturn::{
    EventName, EventStream, NavigationError, Page, ProgressReporter, RawResponse, RenderHandle,
    Renderer, Result, Router, RouterConfig, RouterHosts, Transport, TransportError, VisitRequest,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub const ORIGIN: &str = "http://app.test";

/// Renderer that records what it was asked to draw.
#[derive(Default)]
pub struct RecordingRenderer {
    pub renders: Mutex<Vec<(String, bool)>>,
    pub fail: Mutex<bool>,
    /// Updates to this component wait for the gate.
    gate: Mutex<Option<(String, Arc<Notify>)>>,
    holding: AtomicBool,
}

impl RecordingRenderer {
    pub fn components(&self) -> Vec<String> {
        self.renders.lock().iter().map(|(c, _)| c.clone()).collect()
    }

    /// Hold every update of `component` until `gate` is notified.
    pub fn hold(&self, component: &str, gate: Arc<Notify>) {
        *self.gate.lock() = Some((component.to_string(), gate));
    }

    /// Whether an update is currently waiting on the gate.
    pub fn is_holding(&self) -> bool {
        self.holding.load(Ordering::SeqCst)
    }

    async fn wait_for_gate(&self, component: &str) {
        let gate = self
            .gate
            .lock()
            .as_ref()
            .filter(|(held, _)| held == component)
            .map(|(_, gate)| Arc::clone(gate));
        if let Some(gate) = gate {
            self.holding.store(true, Ordering::SeqCst);
            gate.notified().await;
            self.holding.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn mount(&self, page: &Page) -> Result<RenderHandle> {
        if *self.fail.lock() {
            return Err(NavigationError::Render("mount failed".into()));
        }
        self.renders.lock().push((page.component.clone(), false));
        Ok(RenderHandle(1))
    }

    async fn update(&self, _handle: RenderHandle, page: &Page, preserve_state: bool) -> Result<()> {
        self.wait_for_gate(&page.component).await;
        if *self.fail.lock() {
            return Err(NavigationError::Render("update failed".into()));
        }
        self.renders
            .lock()
            .push((page.component.clone(), preserve_state));
        Ok(())
    }
}

/// One scripted reply.
#[derive(Clone)]
pub struct Reply {
    pub result: std::result::Result<RawResponse, TransportError>,
    /// When set, the reply is held until the gate is notified. The
    /// cancellation token is ignored, like a transport that cannot abort.
    pub gate: Option<Arc<Notify>>,
    pub progress: Vec<(u64, Option<u64>)>,
}

impl Reply {
    pub fn page(page: &Page) -> Self {
        Self::raw(RawResponse::page(page))
    }

    pub fn raw(response: RawResponse) -> Self {
        Self {
            result: Ok(response),
            gate: None,
            progress: Vec::new(),
        }
    }

    pub fn error(error: TransportError) -> Self {
        Self {
            result: Err(error),
            gate: None,
            progress: Vec::new(),
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_progress(mut self, loaded: u64, total: Option<u64>) -> Self {
        self.progress.push((loaded, total));
        self
    }
}

/// Transport answering by request path.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, Reply>>,
    pub requests: Mutex<Vec<VisitRequest>>,
}

impl ScriptedTransport {
    pub fn reply(&self, path: &str, reply: Reply) {
        self.replies.lock().insert(path.to_string(), reply);
    }

    pub fn last_request(&self) -> Option<VisitRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dispatch(
        &self,
        request: VisitRequest,
        progress: ProgressReporter,
        _cancel: CancellationToken,
    ) -> std::result::Result<RawResponse, TransportError> {
        let path = request.url.path().to_string();
        self.requests.lock().push(request);

        let reply = self.replies.lock().get(&path).cloned();
        let Some(reply) = reply else {
            return Ok(RawResponse::new(404));
        };

        for (loaded, total) in &reply.progress {
            progress.report(*loaded, *total);
        }
        if let Some(gate) = &reply.gate {
            gate.notified().await;
        }
        reply.result
    }
}

pub struct Harness {
    pub browser: Arc<MemoryBrowser>,
    pub scroll: Arc<MemoryScroll>,
    pub renderer: Arc<RecordingRenderer>,
    pub transport: Arc<ScriptedTransport>,
    pub router: Router,
}

impl Harness {
    pub fn new(initial: Page) -> Self {
        Self::with_config(initial, RouterConfig::default())
    }

    pub fn with_config(initial: Page, config: RouterConfig) -> Self {
        let browser = Arc::new(MemoryBrowser::new(&format!("{ORIGIN}{}", initial.url)));
        Self::with_browser(initial, config, browser)
    }

    /// Build on an existing browser, e.g. one left behind by a previous
    /// router to simulate a full reload.
    pub fn with_browser(initial: Page, config: RouterConfig, browser: Arc<MemoryBrowser>) -> Self {
        let scroll = Arc::new(MemoryScroll::with_regions(1));
        let renderer = Arc::new(RecordingRenderer::default());
        let transport = Arc::new(ScriptedTransport::default());
        let hosts = RouterHosts::memory(
            browser.clone(),
            scroll.clone(),
            renderer.clone(),
            transport.clone(),
        );
        Self {
            browser,
            scroll,
            renderer,
            transport,
            router: Router::new(initial, hosts, config),
        }
    }

    /// Build and run `init`.
    pub async fn started(initial: Page) -> Self {
        let harness = Self::new(initial);
        harness.router.init().await.unwrap();
        harness
    }

    pub fn stream(&self) -> EventStream {
        self.router.events().subscribe()
    }
}

pub fn names(stream: &EventStream) -> Vec<EventName> {
    stream.drain_names()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
