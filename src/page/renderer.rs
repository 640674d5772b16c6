//! Rendering adapter seam.

use crate::error::Result;
use crate::types::{Page, RenderHandle};
use async_trait::async_trait;

/// Mounts a named component with its props into a UI framework.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// First render. Called once, before any `update`.
    async fn mount(&self, page: &Page) -> Result<RenderHandle>;

    /// Swap in `page`. With `preserve_state` the outgoing component's local
    /// state is carried over instead of remounting fresh.
    ///
    /// The returned future settles once the render is committed.
    async fn update(&self, handle: RenderHandle, page: &Page, preserve_state: bool) -> Result<()>;
}
