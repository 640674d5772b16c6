//! Outgoing requests and the transport seam.

use crate::error::TransportError;
use crate::types::{Method, Page, Progress, RawResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::types::PendingVisit;

pub const HEADER_INERTIA: &str = "X-Inertia";
pub const HEADER_VERSION: &str = "X-Inertia-Version";
pub const HEADER_PARTIAL_DATA: &str = "X-Inertia-Partial-Data";
pub const HEADER_PARTIAL_COMPONENT: &str = "X-Inertia-Partial-Component";
pub const HEADER_ERROR_BAG: &str = "X-Inertia-Error-Bag";
pub const HEADER_LOCATION: &str = "X-Inertia-Location";
pub const HEADER_REQUESTED_WITH: &str = "X-Requested-With";
pub const HEADER_ACCEPT: &str = "Accept";

/// A request ready for the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct VisitRequest {
    pub url: Url,
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub data: Value,
}

impl VisitRequest {
    /// Build the request for `visit`, given the page currently shown.
    ///
    /// Caller headers go first; protocol headers override them.
    pub fn build(visit: &PendingVisit, current: &Page) -> Self {
        let mut headers = visit.headers.clone();
        headers.insert(HEADER_ACCEPT.into(), "text/html, application/xhtml+xml".into());
        headers.insert(HEADER_REQUESTED_WITH.into(), "XMLHttpRequest".into());
        headers.insert(HEADER_INERTIA.into(), "true".into());

        if let Some(version) = &current.version {
            headers.insert(HEADER_VERSION.into(), version.clone());
        }
        if visit.is_partial() {
            headers.insert(HEADER_PARTIAL_COMPONENT.into(), current.component.clone());
            headers.insert(HEADER_PARTIAL_DATA.into(), visit.only.join(","));
        }
        if let Some(bag) = &visit.error_bag {
            headers.insert(HEADER_ERROR_BAG.into(), bag.clone());
        }

        Self {
            url: visit.url.clone(),
            method: visit.method,
            headers,
            data: visit.data.clone(),
        }
    }

    /// Header lookup ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Sink for transport progress ticks.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn Fn(Option<Progress>) + Send + Sync>,
}

impl ProgressReporter {
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(Option<Progress>) + Send + Sync + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// A reporter that discards every tick.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report `loaded` of `total` bytes.
    pub fn report(&self, loaded: u64, total: Option<u64>) {
        (self.sink)(Some(Progress::new(loaded, total)));
    }

    /// Report activity without byte counts.
    pub fn tick(&self) {
        (self.sink)(None);
    }
}

/// Executes visit requests.
///
/// Implementations should stop work once `cancel` fires and return
/// [`TransportError::Aborted`]; late results are discarded either way.
/// Timeouts surface as [`TransportError::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dispatch(
        &self,
        request: VisitRequest,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<RawResponse, TransportError>;
}
