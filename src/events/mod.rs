//! Typed, cancelable pub/sub for navigation lifecycle events.
//!
//! Listeners are registered per [`EventName`] and invoked in registration
//! order. Cancelable events (`before`, `invalid`, `exception`) are vetoed
//! when any listener returns [`EventOutcome::Veto`]; the firing site treats
//! a vetoed event as "skip the default behavior".
//!
//! Besides callback listeners, the bus offers:
//! - an internal namespace ([`InternalEvent`]) used for recovery signals
//! - bounded observer streams that receive a clone of every fired event
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::new();
//!
//! let handle = bus.on(EventName::Before, |event| {
//!     if let GlobalEvent::Before { visit } = event {
//!         if visit.url.path() == "/admin" {
//!             return EventOutcome::Veto;
//!         }
//!     }
//!     EventOutcome::Continue
//! });
//!
//! // Later
//! handle.unsubscribe();
//! ```

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{
    EventName, EventOutcome, EventStream, GlobalEvent, InternalEvent, ListenerHandle, ListenerId,
};
