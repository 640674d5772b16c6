//! Types for the visit lifecycle.

use crate::error::NavigationError;
use crate::events::EventOutcome;
use crate::types::{ArrayFormat, Errors, Method, Page, PreserveOption, Progress};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Unique identifier for a visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisitId(pub u64);

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "visit-{}", self.0)
    }
}

/// Lifecycle state of a visit.
///
/// `Completed`, `Cancelled` and `Interrupted` are terminal and mutually
/// exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitState {
    Pending,
    Active,
    Completed,
    Cancelled,
    Interrupted,
}

impl VisitState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VisitState::Completed | VisitState::Cancelled | VisitState::Interrupted
        )
    }
}

/// Shared, one-way state cell of a visit.
#[derive(Clone, Debug)]
pub struct VisitStatus(Arc<Mutex<VisitState>>);

impl VisitStatus {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(VisitState::Pending)))
    }

    pub fn get(&self) -> VisitState {
        *self.0.lock()
    }

    /// Move to `next`. Fails once a terminal state was reached.
    pub(crate) fn transition(&self, next: VisitState) -> bool {
        let mut state = self.0.lock();
        if state.is_terminal() {
            return false;
        }
        *state = next;
        true
    }

    pub fn is_active(&self) -> bool {
        self.get() == VisitState::Active
    }

    pub fn is_completed(&self) -> bool {
        self.get() == VisitState::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.get() == VisitState::Cancelled
    }

    pub fn is_interrupted(&self) -> bool {
        self.get() == VisitState::Interrupted
    }
}

/// A visit descriptor, built fresh for every navigation.
#[derive(Clone, Debug)]
pub struct PendingVisit {
    pub id: VisitId,
    /// Resolved target. For GET visits the data is already in the query.
    pub url: Url,
    pub method: Method,
    /// Request body. Empty for GET visits.
    pub data: Value,
    pub headers: BTreeMap<String, String>,
    /// Prop keys requested by a partial reload.
    pub only: Vec<String>,
    pub error_bag: Option<String>,
    pub preserve_scroll: PreserveOption,
    pub preserve_state: PreserveOption,
    pub replace: bool,
    pub status: VisitStatus,
}

impl PendingVisit {
    pub fn is_partial(&self) -> bool {
        !self.only.is_empty()
    }
}

pub type BeforeCallback = Arc<dyn Fn(&PendingVisit) -> EventOutcome + Send + Sync>;
pub type VisitCallback = Arc<dyn Fn(&PendingVisit) + Send + Sync>;
pub type CancelTokenCallback = Arc<dyn Fn(VisitCanceller) + Send + Sync>;
pub type ProgressCallback = Arc<dyn Fn(Option<Progress>) + Send + Sync>;
pub type CancelCallback = Arc<dyn Fn() + Send + Sync>;
pub type SuccessCallback = Arc<dyn Fn(&Page) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&Errors) + Send + Sync>;

/// Per-visit callbacks. Each runs right after the matching global event.
#[derive(Clone, Default)]
pub struct VisitCallbacks {
    pub on_cancel_token: Option<CancelTokenCallback>,
    /// Checked before the global `before` event; a veto aborts the visit.
    pub on_before: Option<BeforeCallback>,
    pub on_start: Option<VisitCallback>,
    pub on_progress: Option<ProgressCallback>,
    pub on_finish: Option<VisitCallback>,
    pub on_cancel: Option<CancelCallback>,
    pub on_success: Option<SuccessCallback>,
    pub on_error: Option<ErrorCallback>,
}

/// Options of a single visit.
#[derive(Clone, Default)]
pub struct VisitOptions {
    pub method: Method,
    pub data: Value,
    pub headers: BTreeMap<String, String>,
    pub only: Vec<String>,
    pub error_bag: Option<String>,
    pub preserve_scroll: PreserveOption,
    /// `None` lets the calling operation pick its default.
    pub preserve_state: Option<PreserveOption>,
    pub replace: bool,
    pub array_format: ArrayFormat,
    pub callbacks: VisitCallbacks,
}

impl VisitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Request only these props (partial reload).
    pub fn only<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn error_bag(mut self, bag: impl Into<String>) -> Self {
        self.error_bag = Some(bag.into());
        self
    }

    pub fn preserve_scroll(mut self, preserve: impl Into<PreserveOption>) -> Self {
        self.preserve_scroll = preserve.into();
        self
    }

    pub fn preserve_state(mut self, preserve: impl Into<PreserveOption>) -> Self {
        self.preserve_state = Some(preserve.into());
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn array_format(mut self, format: ArrayFormat) -> Self {
        self.array_format = format;
        self
    }

    pub fn on_cancel_token<F>(mut self, f: F) -> Self
    where
        F: Fn(VisitCanceller) + Send + Sync + 'static,
    {
        self.callbacks.on_cancel_token = Some(Arc::new(f));
        self
    }

    pub fn on_before<F>(mut self, f: F) -> Self
    where
        F: Fn(&PendingVisit) -> EventOutcome + Send + Sync + 'static,
    {
        self.callbacks.on_before = Some(Arc::new(f));
        self
    }

    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&PendingVisit) + Send + Sync + 'static,
    {
        self.callbacks.on_start = Some(Arc::new(f));
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<Progress>) + Send + Sync + 'static,
    {
        self.callbacks.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_finish<F>(mut self, f: F) -> Self
    where
        F: Fn(&PendingVisit) + Send + Sync + 'static,
    {
        self.callbacks.on_finish = Some(Arc::new(f));
        self
    }

    pub fn on_cancel<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_cancel = Some(Arc::new(f));
        self
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&Page) + Send + Sync + 'static,
    {
        self.callbacks.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Errors) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(Arc::new(f));
        self
    }
}

/// The at-most-one visit currently in flight.
pub(crate) struct ActiveVisit {
    pub visit: PendingVisit,
    pub token: CancellationToken,
    pub callbacks: Arc<VisitCallbacks>,
}

pub(crate) type ActiveSlot = Mutex<Option<ActiveVisit>>;

/// Handed to `on_cancel_token`. Cancels its visit, but only while that
/// visit is still the active one.
#[derive(Clone)]
pub struct VisitCanceller {
    pub(crate) id: VisitId,
    pub(crate) slot: Weak<ActiveSlot>,
}

impl VisitCanceller {
    pub fn visit_id(&self) -> VisitId {
        self.id
    }

    /// Returns false when the visit already finished or was replaced.
    pub fn cancel(&self) -> bool {
        let Some(slot) = self.slot.upgrade() else {
            return false;
        };
        let slot = slot.lock();
        match slot.as_ref() {
            Some(active) if active.visit.id == self.id => {
                active.token.cancel();
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for VisitCanceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitCanceller").field("id", &self.id).finish()
    }
}

/// Terminal result of a visit.
#[derive(Clone, Debug)]
pub enum VisitOutcome {
    /// A `before` listener or callback vetoed; nothing was dispatched.
    Vetoed,
    /// The page was applied without validation errors.
    Succeeded(Arc<Page>),
    /// The page was applied and carries validation errors (scoped to the
    /// error bag, if any).
    ValidationFailed(Errors),
    Cancelled,
    /// A newer visit took over.
    Interrupted,
    /// The server asked for a full-page load of this URL.
    LocationVisit(Url),
    /// The response was not a page. `reloaded` tells whether the fallback
    /// full-page load was performed.
    Invalid { reloaded: bool },
    Exception {
        error: Arc<NavigationError>,
        reloaded: bool,
    },
}

impl VisitOutcome {
    pub fn page(&self) -> Option<&Arc<Page>> {
        match self {
            VisitOutcome::Succeeded(page) => Some(page),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VisitOutcome::Succeeded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_are_sticky() {
        let status = VisitStatus::new();
        assert!(status.transition(VisitState::Active));
        assert!(status.transition(VisitState::Interrupted));
        assert!(!status.transition(VisitState::Completed));
        assert!(status.is_interrupted());
    }

    #[test]
    fn test_canceller_ignores_replaced_visit() {
        let slot: Arc<ActiveSlot> = Arc::new(Mutex::new(None));
        let canceller = VisitCanceller {
            id: VisitId(1),
            slot: Arc::downgrade(&slot),
        };
        assert!(!canceller.cancel());

        let token = CancellationToken::new();
        let visit = PendingVisit {
            id: VisitId(2),
            url: Url::parse("http://app.test/").unwrap(),
            method: Method::Get,
            data: Value::Null,
            headers: BTreeMap::new(),
            only: Vec::new(),
            error_bag: None,
            preserve_scroll: PreserveOption::default(),
            preserve_state: PreserveOption::default(),
            replace: false,
            status: VisitStatus::new(),
        };
        *slot.lock() = Some(ActiveVisit {
            visit,
            token: token.clone(),
            callbacks: Arc::default(),
        });

        assert!(!canceller.cancel());
        assert!(!token.is_cancelled());

        let current = VisitCanceller {
            id: VisitId(2),
            slot: Arc::downgrade(&slot),
        };
        assert!(current.cancel());
        assert!(token.is_cancelled());
    }
}
