//! Host location: full-page loads and the location-visit marker.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// How the current document was reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NavigationType {
    #[default]
    Navigate,
    Reload,
    BackForward,
}

/// Marker stashed before a full-page location visit, consumed on the next init.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationVisit {
    pub preserve_scroll: bool,
}

/// The host's `window.location` plus a session-scoped marker slot.
pub trait Location: Send + Sync {
    /// Current absolute URL, including fragment.
    fn href(&self) -> String;

    /// Start a full-page load of `url`.
    fn assign(&self, url: &str);

    /// Reload the current document.
    fn reload(&self);

    fn navigation_type(&self) -> NavigationType {
        NavigationType::Navigate
    }

    /// Persist the marker across the upcoming full-page load.
    fn stash_location_visit(&self, visit: LocationVisit) -> Result<()>;

    /// Take (and remove) a stashed marker.
    fn take_location_visit(&self) -> Option<LocationVisit>;
}
