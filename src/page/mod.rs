//! The current page snapshot and the renderer it drives.
//!
//! [`PageStore`] exclusively owns the current snapshot. It is mutated only
//! through `set` (updates history and fires `navigate`), `set_quietly`
//! (history already reflects the page) and `clear` (history state was
//! unrecoverable). Apply steps are serialized: a second `set` waits until
//! the renderer settled the first one.

mod renderer;
mod store;

pub use renderer::Renderer;
pub use store::{PageStore, SetOptions, SetOutcome};
