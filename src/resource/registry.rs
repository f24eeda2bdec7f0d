//! Load-status and named-group bookkeeping for external resources.
//!
//! `ResourceRegistry` is the single source of truth for "is this URL
//! loading or loaded" and "which URLs does named group G stand for". It
//! performs no I/O; the loader mutates it as loads are issued and
//! complete. Operations never fail — unknown keys read as absent.

use dashmap::DashMap;
use tracing::debug;

use super::{CanonicalUrl, PathConfig, ResourceKind};

/// Byte offsets at which `//` marks an absolute or protocol-relative URL:
/// a leading `//`, or a two-to-four character scheme followed by `://`.
const PASSTHROUGH_OFFSETS: [usize; 4] = [0, 5, 6, 7];

/// Lifecycle state of one canonical URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    /// The load primitive has been issued and has not completed.
    Loading,
    /// The resource completed loading this generation.
    Loaded,
}

/// Shared registry of resource statuses, named groups and path config.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    status: DashMap<(ResourceKind, CanonicalUrl), LoadStatus>,
    groups: DashMap<(ResourceKind, String), Vec<CanonicalUrl>>,
    paths: DashMap<ResourceKind, PathConfig>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Install the path configuration for `kind`, replacing any previous
    /// configuration.
    pub fn set_path(&self, kind: ResourceKind, config: PathConfig) {
        self.paths.insert(kind, config);
    }

    /// Remove the path configuration for `kind`.
    pub fn clear_path(&self, kind: ResourceKind) { self.paths.remove(&kind); }

    /// Canonicalize `url` for `kind`.
    ///
    /// Empty URLs and URLs whose `//` sits at an absolute or
    /// protocol-relative offset pass through unmodified. Everything else
    /// has the kind's path configuration applied (a prefix, or first-match
    /// replacements) and the kind extension appended unless the URL
    /// already contains it.
    #[must_use]
    pub fn canonicalize(&self, kind: ResourceKind, url: &str) -> CanonicalUrl {
        if url.is_empty() {
            return CanonicalUrl::new(String::new());
        }
        if let Some(at) = url.find("//") {
            if PASSTHROUGH_OFFSETS.contains(&at) {
                return CanonicalUrl::new(url.to_owned());
            }
        }
        let mut out = url.to_owned();
        match self.paths.get(&kind).map(|entry| entry.value().clone()) {
            Some(PathConfig::Prefix(base)) => out = format!("{base}{out}"),
            Some(PathConfig::Remap(map)) => {
                for (needle, replacement) in &map {
                    out = out.replacen(needle.as_str(), replacement, 1);
                }
            }
            None => {}
        }
        let extension = kind.extension();
        if !out.contains(extension) {
            out.push_str(extension);
        }
        CanonicalUrl::new(out)
    }

    /// Whether `url` is currently loading or loaded.
    #[must_use]
    pub fn exists(&self, kind: ResourceKind, url: &CanonicalUrl) -> bool {
        self.status.contains_key(&(kind, url.clone()))
    }

    /// Whether `url` finished loading. Vacuously true for an empty URL.
    #[must_use]
    pub fn loaded(&self, kind: ResourceKind, url: &CanonicalUrl) -> bool {
        url.as_str().is_empty()
            || self
                .status
                .get(&(kind, url.clone()))
                .is_some_and(|status| *status.value() == LoadStatus::Loaded)
    }

    /// Record that the load primitive has been issued for `url`.
    pub fn mark_loading(&self, kind: ResourceKind, url: &CanonicalUrl) {
        self.status.insert((kind, url.clone()), LoadStatus::Loading);
    }

    /// Record that `url` finished loading.
    pub fn mark_loaded(&self, kind: ResourceKind, url: &CanonicalUrl) {
        self.status.insert((kind, url.clone()), LoadStatus::Loaded);
    }

    /// Drop all knowledge of `url`, returning it to "unknown".
    pub fn forget(&self, kind: ResourceKind, url: &CanonicalUrl) {
        self.status.remove(&(kind, url.clone()));
    }

    /// Associate `urls` with the named group `(kind, name)`.
    pub fn register(&self, kind: ResourceKind, name: &str, urls: Vec<CanonicalUrl>) {
        debug!(%kind, name, count = urls.len(), "register resource group");
        self.groups.insert((kind, name.to_owned()), urls);
    }

    /// Drop the named group, returning the URLs it stood for.
    pub fn unregister(&self, kind: ResourceKind, name: &str) -> Option<Vec<CanonicalUrl>> {
        self.groups
            .remove(&(kind, name.to_owned()))
            .map(|(_, urls)| urls)
    }

    /// The URLs currently associated with the named group, if any.
    #[must_use]
    pub fn list(&self, kind: ResourceKind, name: &str) -> Option<Vec<CanonicalUrl>> {
        self.groups
            .get(&(kind, name.to_owned()))
            .map(|entry| entry.value().clone())
    }

    /// Whether the named group is registered with every URL loaded.
    ///
    /// An unregistered name is not loaded; a registered empty group is
    /// vacuously loaded.
    #[must_use]
    pub fn group_loaded(&self, kind: ResourceKind, name: &str) -> bool {
        self.list(kind, name)
            .is_some_and(|urls| urls.iter().all(|url| self.loaded(kind, url)))
    }
}

#[cfg(test)]
mod tests;
