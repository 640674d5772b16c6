//! Session-history synchronization.
//!
//! Every navigation writes one history entry. An entry holds either the
//! page snapshot itself or, when the snapshot is too large (or history
//! encryption is on), an opaque blob produced by a [`StateCodec`]. Scroll
//! offsets are stored next to the payload so saving them never re-encodes
//! the page.
//!
//! Entries carry a structural marker (see [`HistoryEntry::parse`]) so
//! foreign states pushed by other scripts are recognized, and an epoch:
//! [`HistoryAdapter::clear`] starts a new epoch and older entries then fail
//! to decode.

mod adapter;
mod codec;
mod entry;

pub use adapter::{BrowserHistory, EncodedState, HistoryAdapter, StagedEntry};
pub use codec::{MessagePackCodec, StateCodec};
pub use entry::{EntryPayload, HistoryEntry, ScrollRecord, ENTRY_FORMAT, ENTRY_MARKER};
