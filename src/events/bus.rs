//! Event bus dispatching lifecycle events to listeners and observer streams.

use crate::error::Result;
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{
    EventName, EventOutcome, EventStream, GlobalEvent, InternalEvent, ListenerHandle, ListenerId,
};

/// Default buffer size for observer streams.
const DEFAULT_STREAM_BUFFER: usize = 256;

type Callback = Box<dyn Fn(&GlobalEvent) -> EventOutcome + Send + Sync>;
type InternalCallback = Box<dyn Fn() + Send + Sync>;

struct Listener {
    id: ListenerId,
    name: EventName,
    /// Cleared on unsubscribe so an in-flight dispatch skips it.
    active: AtomicBool,
    callback: Callback,
}

struct InternalListener {
    id: ListenerId,
    event: InternalEvent,
    active: AtomicBool,
    callback: InternalCallback,
}

/// Shared listener registry. Handles keep a weak reference to it.
#[derive(Default)]
pub(crate) struct Registry {
    listeners: RwLock<Vec<Arc<Listener>>>,
    internal: RwLock<Vec<Arc<InternalListener>>>,
    streams: RwLock<HashMap<ListenerId, Sender<GlobalEvent>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub(crate) fn remove(&self, id: ListenerId) {
        {
            let mut listeners = self.listeners.write();
            if let Some(pos) = listeners.iter().position(|l| l.id == id) {
                let listener = listeners.remove(pos);
                listener.active.store(false, Ordering::SeqCst);
                return;
            }
        }

        let mut internal = self.internal.write();
        if let Some(pos) = internal.iter().position(|l| l.id == id) {
            let listener = internal.remove(pos);
            listener.active.store(false, Ordering::SeqCst);
        }
    }

    pub(crate) fn remove_stream(&self, id: ListenerId) {
        self.streams.write().remove(&id);
    }
}

/// Cancelable pub/sub for navigation lifecycle events.
pub struct EventBus {
    registry: Arc<Registry>,
    stream_buffer: usize,
}

impl EventBus {
    /// Create an empty event bus.
    pub fn new() -> Self {
        Self::with_stream_buffer(DEFAULT_STREAM_BUFFER)
    }

    /// Create an event bus whose observer streams buffer up to `buffer` events.
    pub fn with_stream_buffer(buffer: usize) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            stream_buffer: buffer.max(1),
        }
    }

    /// Register a listener for `name`.
    ///
    /// The callback's outcome is honored only for cancelable events.
    pub fn on<F>(&self, name: EventName, callback: F) -> ListenerHandle
    where
        F: Fn(&GlobalEvent) -> EventOutcome + Send + Sync + 'static,
    {
        let id = self.registry.next_id();
        self.registry.listeners.write().push(Arc::new(Listener {
            id,
            name,
            active: AtomicBool::new(true),
            callback: Box::new(callback),
        }));

        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register a listener by event name string.
    pub fn on_named<F>(&self, name: &str, callback: F) -> Result<ListenerHandle>
    where
        F: Fn(&GlobalEvent) -> EventOutcome + Send + Sync + 'static,
    {
        let name: EventName = name.parse()?;
        Ok(self.on(name, callback))
    }

    /// Register a listener that never vetoes.
    pub fn observe<F>(&self, name: EventName, callback: F) -> ListenerHandle
    where
        F: Fn(&GlobalEvent) + Send + Sync + 'static,
    {
        self.on(name, move |event| {
            callback(event);
            EventOutcome::Continue
        })
    }

    /// Register a listener for an internal signal.
    pub fn on_internal<F>(&self, event: InternalEvent, callback: F) -> ListenerHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.registry.next_id();
        self.registry.internal.write().push(Arc::new(InternalListener {
            id,
            event,
            active: AtomicBool::new(true),
            callback: Box::new(callback),
        }));

        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Open an observer stream receiving every fired event.
    pub fn subscribe(&self) -> EventStream {
        let id = self.registry.next_id();
        let (sender, receiver) = bounded(self.stream_buffer);
        self.registry.streams.write().insert(id, sender);

        EventStream {
            id,
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Fire an event. Returns [`EventOutcome::Veto`] when the event is
    /// cancelable and at least one listener vetoed it.
    ///
    /// The listener list is snapshotted before dispatch: listeners added
    /// during dispatch are not invoked, listeners removed during dispatch
    /// are skipped. Every listener runs even after a veto.
    pub fn fire(&self, event: &GlobalEvent) -> EventOutcome {
        let name = event.name();
        let snapshot: Vec<Arc<Listener>> = self
            .registry
            .listeners
            .read()
            .iter()
            .filter(|l| l.name == name)
            .cloned()
            .collect();

        let mut prevented = false;
        for listener in snapshot {
            if !listener.active.load(Ordering::SeqCst) {
                continue;
            }
            let outcome = (listener.callback)(event);
            if name.is_cancelable() && outcome.is_veto() {
                prevented = true;
            }
        }

        if prevented {
            tracing::debug!(event = %name, "event vetoed by listener");
        }

        self.broadcast(event);

        if prevented {
            EventOutcome::Veto
        } else {
            EventOutcome::Continue
        }
    }

    /// Fire an internal signal.
    pub fn fire_internal(&self, event: InternalEvent) {
        let snapshot: Vec<Arc<InternalListener>> = self
            .registry
            .internal
            .read()
            .iter()
            .filter(|l| l.event == event)
            .cloned()
            .collect();

        tracing::debug!(?event, listeners = snapshot.len(), "firing internal event");

        for listener in snapshot {
            if listener.active.load(Ordering::SeqCst) {
                (listener.callback)();
            }
        }
    }

    /// Number of registered listeners (public and internal).
    pub fn listener_count(&self) -> usize {
        self.registry.listeners.read().len() + self.registry.internal.read().len()
    }

    /// Number of open observer streams.
    pub fn stream_count(&self) -> usize {
        self.registry.streams.read().len()
    }

    /// Send to every stream. Drops streams that are full or disconnected.
    fn broadcast(&self, event: &GlobalEvent) {
        let mut to_remove = Vec::new();

        {
            let streams = self.registry.streams.read();
            for (id, sender) in streams.iter() {
                if sender.try_send(event.clone()).is_err() {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut streams = self.registry.streams.write();
            for id in to_remove {
                tracing::warn!(stream = id.0, "dropping slow event stream");
                streams.remove(&id);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
