//! The visit lifecycle.
//!
//! A visit moves `pending -> active -> {completed | cancelled | interrupted}`:
//!
//! - **pending**: descriptor built, `before` fired. A veto ends the visit
//!   here; it never becomes active and no `start`/`finish` fire.
//! - **active**: request dispatched. Exactly one visit is active at a time.
//! - **interrupted**: a newer visit started; the older visit's token fired
//!   and its `cancel`/`finish` were raised before the newer request left.
//! - **cancelled**: the caller cancelled through [`Router::cancel`] or the
//!   [`VisitCanceller`] handed to `on_cancel_token`.
//! - **completed**: a response arrived and was handled.
//!
//! A response arriving after the token fired is dropped without touching
//! the page store.
//!
//! # Example
//!
//! ```ignore
//! let router = Router::new(initial_page, hosts, RouterConfig::default());
//! router.init().await?;
//!
//! let outcome = router
//!     .post("/users", json!({"name": "Ada"}), VisitOptions::new().error_bag("create"))
//!     .await?;
//!
//! if let VisitOutcome::ValidationFailed(errors) = outcome {
//!     // errors["name"] ...
//! }
//! ```

mod request;
mod response;
mod router;
mod types;

pub use request::{
    ProgressReporter, Transport, VisitRequest, HEADER_ACCEPT, HEADER_ERROR_BAG, HEADER_INERTIA,
    HEADER_LOCATION, HEADER_PARTIAL_COMPONENT, HEADER_PARTIAL_DATA, HEADER_REQUESTED_WITH,
    HEADER_VERSION,
};
pub use response::{classify, is_version_mismatch, ResponseKind};
pub use router::{Router, RouterHosts};
pub use types::{
    BeforeCallback, CancelCallback, CancelTokenCallback, ErrorCallback, PendingVisit,
    ProgressCallback, SuccessCallback, VisitCallback, VisitCallbacks, VisitCanceller, VisitId,
    VisitOptions, VisitOutcome, VisitState, VisitStatus,
};
