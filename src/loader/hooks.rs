//! Lifecycle hooks invoked by the dependency loader.
//!
//! [`LoaderHooks`] stores optional callbacks the installation layer
//! registers to observe loader-driven lifecycle events. The loader never
//! touches the document itself; unloading a stale resource group only
//! fires the hook with the URLs concerned and the installer does the
//! actual teardown.

use crate::resource::{CanonicalUrl, ResourceKind};

/// Callback fired when a named group's resources are unloaded.
///
/// Receives the kind, the group name, and the URLs actually unloaded.
pub type UnloadFn = Box<dyn Fn(ResourceKind, &str, &[CanonicalUrl]) + Send + Sync>;

/// Optional callbacks executed during loader lifecycle transitions.
#[derive(Default)]
pub struct LoaderHooks {
    on_unload: Option<UnloadFn>,
}

impl LoaderHooks {
    /// Hooks with nothing registered.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register a callback fired when a group's resources are unloaded.
    #[must_use]
    pub fn on_unload(
        mut self,
        hook: impl Fn(ResourceKind, &str, &[CanonicalUrl]) + Send + Sync + 'static,
    ) -> Self {
        self.on_unload = Some(Box::new(hook));
        self
    }

    pub(crate) fn notify_unload(&self, kind: ResourceKind, name: &str, urls: &[CanonicalUrl]) {
        if let Some(hook) = &self.on_unload {
            hook(kind, name, urls);
        }
    }
}

impl std::fmt::Debug for LoaderHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderHooks")
            .field("on_unload", &self.on_unload.is_some())
            .finish()
    }
}
