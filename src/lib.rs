//! # Pageturn
//!
//! Client-side navigation engine for server-driven single-page apps. The
//! server answers visits with a page object (component, props, url,
//! version) instead of HTML; the router swaps the rendered component in
//! place and keeps session history, scroll offsets and page state in step.
//!
//! ## Core Concepts
//!
//! - **Visits**: one navigation attempt; at most one is active, newer ones win
//! - **Page store**: the single current page snapshot
//! - **History**: one session-history entry per navigation, restorable on back/forward
//! - **Events**: cancelable lifecycle events (`before`, `invalid`, `exception`)
//!
//! The host supplies the rendering adapter, the HTTP transport, the
//! session-history and location primitives and DOM scrolling through the
//! traits re-exported here. [`memory`] has in-memory versions of the
//! browser-side ones.
//!
//! ## Example
//!
//! ```ignore
//! use pageturn::{Router, RouterConfig, RouterHosts, VisitOptions};
//!
//! let router = Router::new(initial_page, hosts, RouterConfig::default());
//! router.init().await?;
//!
//! router.on(EventName::Before, |event| {
//!     // Veto visits while a form is dirty
//!     EventOutcome::Continue
//! });
//!
//! router.visit("/users", VisitOptions::new().preserve_scroll(true)).await?;
//! router.popstate(browser_state).await;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod head;
pub mod history;
pub mod href;
pub mod link;
pub mod location;
pub mod memory;
pub mod page;
pub mod popstate;
pub mod scroll;
pub mod types;
pub mod visit;

// Re-exports
pub use config::{FallbackPolicy, RouterConfig};
pub use error::{NavigationError, Result, TransportError};
pub use events::{
    EventBus, EventName, EventOutcome, EventStream, GlobalEvent, InternalEvent, ListenerHandle,
    ListenerId,
};
pub use head::{HeadManager, HeadProvider, HeadTag, Renderable};
pub use history::{
    BrowserHistory, EncodedState, EntryPayload, HistoryAdapter, HistoryEntry, MessagePackCodec,
    ScrollRecord, StagedEntry, StateCodec,
};
pub use link::{should_intercept, ClickEvent, LinkOptions, MouseButton};
pub use location::{Location, LocationVisit, NavigationType};
pub use page::{PageStore, Renderer, SetOptions, SetOutcome};
pub use popstate::{PopstateHandler, PopstateOutcome};
pub use scroll::{ScrollHost, ScrollManager};
pub use types::*;
pub use visit::{
    PendingVisit, ProgressReporter, ResponseKind, Router, RouterHosts, Transport, VisitCallbacks,
    VisitCanceller, VisitId, VisitOptions, VisitOutcome, VisitRequest, VisitState, VisitStatus,
};
