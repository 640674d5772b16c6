//! Response classification.

use crate::types::{Page, RawResponse};

use super::request::{HEADER_INERTIA, HEADER_LOCATION};

/// What a transport response asks the router to do.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseKind {
    /// A structurally valid page.
    Page(Page),
    /// Leave the app: full-page load of this (possibly relative) URL.
    Location(String),
    /// Anything else.
    Invalid,
}

/// Classify a raw response.
///
/// Pages must carry the `X-Inertia` header and a body with at least
/// `component` and `url`. A `409` with `X-Inertia-Location` requests a
/// location visit.
pub fn classify(response: &RawResponse) -> ResponseKind {
    if response.header(HEADER_INERTIA).is_some() {
        return match serde_json::from_value::<Page>(response.body.clone()) {
            Ok(page) => ResponseKind::Page(page),
            Err(e) => {
                tracing::debug!(status = response.status, error = %e, "malformed page payload");
                ResponseKind::Invalid
            }
        };
    }

    if response.status == 409 {
        if let Some(location) = response.header(HEADER_LOCATION) {
            return ResponseKind::Location(location.to_string());
        }
    }

    ResponseKind::Invalid
}

/// Whether `incoming` was built against different assets than `current`.
///
/// Only compares when both sides know their version.
pub fn is_version_mismatch(current: &Page, incoming: &Page) -> bool {
    match (&current.version, &incoming.version) {
        (Some(current), Some(incoming)) => current != incoming,
        _ => false,
    }
}
