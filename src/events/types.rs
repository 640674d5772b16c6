//! Event types for the navigation event bus.

use crate::error::{NavigationError, Result};
use crate::types::{Errors, Page, Progress, RawResponse};
use crate::visit::PendingVisit;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::bus::Registry;

/// Public lifecycle events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventName {
    Before,
    Start,
    Progress,
    Finish,
    Cancel,
    Navigate,
    Success,
    Error,
    Invalid,
    Exception,
}

impl EventName {
    pub const ALL: [EventName; 10] = [
        EventName::Before,
        EventName::Start,
        EventName::Progress,
        EventName::Finish,
        EventName::Cancel,
        EventName::Navigate,
        EventName::Success,
        EventName::Error,
        EventName::Invalid,
        EventName::Exception,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Before => "before",
            EventName::Start => "start",
            EventName::Progress => "progress",
            EventName::Finish => "finish",
            EventName::Cancel => "cancel",
            EventName::Navigate => "navigate",
            EventName::Success => "success",
            EventName::Error => "error",
            EventName::Invalid => "invalid",
            EventName::Exception => "exception",
        }
    }

    /// Whether a listener may veto this event.
    pub fn is_cancelable(&self) -> bool {
        matches!(
            self,
            EventName::Before | EventName::Invalid | EventName::Exception
        )
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = NavigationError;

    fn from_str(s: &str) -> Result<Self> {
        EventName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| NavigationError::UnknownEvent(s.to_string()))
    }
}

/// Internal-only signals, not part of the public cancelable set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InternalEvent {
    /// A history entry could not be restored; the page store was cleared.
    MissingHistoryItem,
}

/// What a listener wants the firing site to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EventOutcome {
    #[default]
    Continue,
    Veto,
}

impl EventOutcome {
    pub fn is_veto(&self) -> bool {
        matches!(self, EventOutcome::Veto)
    }
}

/// A fired lifecycle event with its payload.
#[derive(Clone, Debug)]
pub enum GlobalEvent {
    Before { visit: PendingVisit },
    Start { visit: PendingVisit },
    Progress { progress: Option<Progress> },
    Finish { visit: PendingVisit },
    Cancel,
    Navigate { page: Arc<Page> },
    Success { page: Arc<Page> },
    Error { errors: Errors },
    Invalid { response: RawResponse },
    Exception { error: Arc<NavigationError> },
}

impl GlobalEvent {
    pub fn name(&self) -> EventName {
        match self {
            GlobalEvent::Before { .. } => EventName::Before,
            GlobalEvent::Start { .. } => EventName::Start,
            GlobalEvent::Progress { .. } => EventName::Progress,
            GlobalEvent::Finish { .. } => EventName::Finish,
            GlobalEvent::Cancel => EventName::Cancel,
            GlobalEvent::Navigate { .. } => EventName::Navigate,
            GlobalEvent::Success { .. } => EventName::Success,
            GlobalEvent::Error { .. } => EventName::Error,
            GlobalEvent::Invalid { .. } => EventName::Invalid,
            GlobalEvent::Exception { .. } => EventName::Exception,
        }
    }

    pub fn is_cancelable(&self) -> bool {
        self.name().is_cancelable()
    }
}

/// Unique identifier for a listener or stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Returned by every registration; call [`unsubscribe`](Self::unsubscribe)
/// to remove the listener. Dropping the handle leaves the listener in place.
#[derive(Debug)]
pub struct ListenerHandle {
    pub(super) id: ListenerId,
    pub(super) registry: Weak<Registry>,
}

impl ListenerHandle {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener. A dispatch already in progress will not invoke it.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

/// Observer stream receiving a clone of every fired event.
pub struct EventStream {
    pub id: ListenerId,
    pub(super) receiver: crossbeam_channel::Receiver<GlobalEvent>,
    pub(super) registry: Weak<Registry>,
}

impl EventStream {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> std::result::Result<GlobalEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<GlobalEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<GlobalEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take everything buffered so far.
    pub fn drain(&self) -> Vec<GlobalEvent> {
        self.receiver.try_iter().collect()
    }

    /// Names of everything buffered so far, in firing order.
    pub fn drain_names(&self) -> Vec<EventName> {
        self.drain().iter().map(GlobalEvent::name).collect()
    }

    /// Stop receiving events.
    pub fn close(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_stream(self.id);
        }
    }
}
