//! Link interception.
//!
//! Hosts forward anchor clicks here; [`should_intercept`] decides whether
//! the click becomes a visit or is left to the browser (new tab, download,
//! editing).

use crate::error::Result;
use crate::types::{Method, PreserveOption};
use crate::visit::{Router, VisitOptions, VisitOutcome};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Pointer button of a click.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseButton {
    #[default]
    Primary,
    Auxiliary,
    Secondary,
}

/// The parts of a DOM click event that matter for interception.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClickEvent {
    pub button: MouseButton,
    pub alt_key: bool,
    pub ctrl_key: bool,
    pub meta_key: bool,
    pub shift_key: bool,
    pub default_prevented: bool,
    pub target_is_content_editable: bool,
}

/// Whether a click should be turned into a visit.
pub fn should_intercept(event: &ClickEvent) -> bool {
    !(event.target_is_content_editable
        || event.default_prevented
        || event.button != MouseButton::Primary
        || event.alt_key
        || event.ctrl_key
        || event.meta_key
        || event.shift_key)
}

/// Attributes of a link component.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkOptions {
    pub method: Method,
    pub data: Value,
    pub replace: bool,
    pub preserve_scroll: bool,
    /// Defaults to true for every method but GET.
    pub preserve_state: Option<bool>,
    pub only: Vec<String>,
    pub headers: BTreeMap<String, String>,
    pub error_bag: Option<String>,
}

impl LinkOptions {
    pub fn into_visit_options(self) -> VisitOptions {
        let preserve_state = self.preserve_state.unwrap_or(!self.method.is_get());
        let mut options = VisitOptions::new()
            .method(self.method)
            .data(self.data)
            .replace(self.replace)
            .preserve_scroll(self.preserve_scroll)
            .preserve_state(PreserveOption::Bool(preserve_state))
            .only(self.only);
        options.headers = self.headers;
        options.error_bag = self.error_bag;
        options
    }
}

impl From<LinkOptions> for VisitOptions {
    fn from(options: LinkOptions) -> Self {
        options.into_visit_options()
    }
}

impl Router {
    /// Handle a click on a link to `href`.
    ///
    /// Returns `Ok(None)` when the click is left to the browser.
    pub async fn click(
        &self,
        href: &str,
        event: &ClickEvent,
        options: LinkOptions,
    ) -> Result<Option<VisitOutcome>> {
        if !should_intercept(event) {
            return Ok(None);
        }
        self.visit(href, options.into()).await.map(Some)
    }
}
