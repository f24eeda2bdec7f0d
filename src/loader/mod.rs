//! Dependency-ordered resource loading.
//!
//! `DependencyLoader` coordinates asynchronous loading of script or style
//! resources identified by raw URL or by symbolic name: deduplication
//! against the shared [`ResourceRegistry`], unloading of stale versions
//! when a name is re-bound to different URLs, recursive resolution of
//! declared dependencies, and readiness notification through a
//! [`ReadinessBus`].
//!
//! The actual installation of a resource is delegated to an injected
//! [`ResourceFetcher`]; the loader only decides *which* URLs to issue,
//! *when*, and who to notify once a group of them is fully loaded. Loads
//! that can be satisfied immediately (already loading or loaded) are still
//! completed on a future scheduler tick, never inside the requesting call.

mod hooks;

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::debug;

pub use self::hooks::{LoaderHooks, UnloadFn};
use crate::{
    readiness::{ReadinessBus, ReadyFn, SubscriptionId, Topic},
    resource::{CanonicalUrl, ResourceKind, ResourceRegistry},
    scheduler::Scheduler,
};

/// Port through which the loader issues resource installation.
///
/// Implementations install the resource (script element, link element,
/// prefetch, ...) and invoke `done` exactly once when it is in place. There
/// is no error channel: transport-level failures are the request layer's
/// concern, not the loader's.
pub trait ResourceFetcher: Send + Sync {
    /// Install the resource at `url` and call `done` when complete.
    fn fetch(&self, kind: ResourceKind, url: &CanonicalUrl, done: Box<dyn FnOnce() + Send>);
}

/// Callback receiving the names a readiness query found unregistered.
pub type MissingFn = Box<dyn FnMut(&[String]) + Send>;

#[derive(Default)]
struct DependencyGraph {
    /// Declared prerequisites per name.
    dependencies: HashMap<String, Vec<String>>,
    /// Declared URL overrides per name; a name without one loads itself.
    urls: HashMap<String, Vec<String>>,
}

struct LoaderInner {
    kind: ResourceKind,
    registry: Arc<ResourceRegistry>,
    bus: ReadinessBus,
    fetcher: Arc<dyn ResourceFetcher>,
    scheduler: Arc<dyn Scheduler>,
    hooks: LoaderHooks,
    graph: Mutex<DependencyGraph>,
}

/// Cloneable handle to one kind-scoped dependency loader.
#[derive(Clone)]
pub struct DependencyLoader(Arc<LoaderInner>);

impl DependencyLoader {
    /// Create a loader for `kind` over the shared registry.
    #[must_use]
    pub fn new(
        kind: ResourceKind,
        registry: Arc<ResourceRegistry>,
        fetcher: Arc<dyn ResourceFetcher>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self::with_hooks(kind, registry, fetcher, scheduler, LoaderHooks::default())
    }

    /// Create a loader with lifecycle hooks installed.
    #[must_use]
    pub fn with_hooks(
        kind: ResourceKind,
        registry: Arc<ResourceRegistry>,
        fetcher: Arc<dyn ResourceFetcher>,
        scheduler: Arc<dyn Scheduler>,
        hooks: LoaderHooks,
    ) -> Self {
        Self(Arc::new(LoaderInner {
            kind,
            registry,
            bus: ReadinessBus::new(),
            fetcher,
            scheduler,
            hooks,
            graph: Mutex::new(DependencyGraph::default()),
        }))
    }

    /// The resource kind this loader manages.
    #[must_use]
    pub fn kind(&self) -> ResourceKind { self.0.kind }

    fn graph(&self) -> MutexGuard<'_, DependencyGraph> {
        self.0.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load `urls` as the named group `name`.
    ///
    /// See [`load_with`](DependencyLoader::load_with); this variant
    /// registers no completion callback.
    pub fn load(&self, urls: &[&str], name: Option<&str>) { self.load_impl(urls, name, None); }

    /// Load `urls` as the named group `name`, invoking `callback` once the
    /// whole group is loaded.
    ///
    /// If `name` was previously bound to a different URL set, that set is
    /// unloaded first (firing the unload hook) before the new group can
    /// complete. URLs already loading or loaded are not re-issued to the
    /// fetcher, but the callback still fires once the group is ready —
    /// always on a later scheduler tick, never inside this call.
    pub fn load_with(
        &self,
        urls: &[&str],
        name: Option<&str>,
        callback: ReadyFn,
    ) -> SubscriptionId {
        // load_impl only returns None when no callback was supplied.
        match self.load_impl(urls, name, Some(callback)) {
            Some(id) => id,
            None => unreachable!("a callback was supplied"),
        }
    }

    fn load_impl(
        &self,
        urls: &[&str],
        name: Option<&str>,
        callback: Option<ReadyFn>,
    ) -> Option<SubscriptionId> {
        let kind = self.0.kind;
        let canonical: Vec<CanonicalUrl> = urls
            .iter()
            .map(|url| self.0.registry.canonicalize(kind, url))
            .collect();
        let name = match name {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => synthetic_name(&canonical),
        };

        // Re-binding a name to different URLs unloads the previous set
        // before anything new is issued.
        if let Some(previous) = self.0.registry.list(kind, &name) {
            if previous != canonical {
                debug!(%kind, %name, "name re-bound to new urls, unloading previous set");
                self.unload_name(&name);
            }
        }
        self.0.registry.register(kind, &name, canonical.clone());

        let topic = Topic::new(kind, std::slice::from_ref(&name));
        let subscription = callback.map(|callback| self.0.bus.subscribe(topic, callback));

        for url in &canonical {
            if self.0.registry.exists(kind, url) {
                continue;
            }
            self.0.registry.mark_loading(kind, url);
            debug!(%kind, %url, "issuing resource load");
            #[cfg(feature = "metrics")]
            crate::metrics::inc_resource_loads(kind);
            let loader = self.clone();
            let loaded = url.clone();
            self.0.fetcher.fetch(
                kind,
                url,
                Box::new(move || {
                    loader.0.registry.mark_loaded(loader.0.kind, &loaded);
                    loader.check();
                }),
            );
        }

        // Even a fully short-circuited load completes asynchronously.
        let loader = self.clone();
        self.0
            .scheduler
            .defer(Box::new(move || loader.check()));
        subscription
    }

    /// Unload the named group: drop the URL association, fire the unload
    /// hook with the URLs actually unloaded, and forget their statuses.
    ///
    /// Unknown names and repeated calls are no-ops.
    pub fn unload(&self, name: &str) { self.unload_name(name); }

    fn unload_name(&self, name: &str) {
        let kind = self.0.kind;
        let Some(urls) = self.0.registry.unregister(kind, name) else {
            return;
        };
        debug!(%kind, name, count = urls.len(), "unloading resource group");
        if !urls.is_empty() {
            self.0.hooks.notify_unload(kind, name, &urls);
        }
        for url in &urls {
            self.0.registry.forget(kind, url);
        }
    }

    /// Declare `dependencies` as prerequisites of `name`.
    ///
    /// Merges into the dependency graph; triggers no loading.
    pub fn declare(&self, name: &str, dependencies: &[&str]) {
        let dependencies = dependencies.iter().map(|&d| d.to_owned()).collect();
        self.graph()
            .dependencies
            .insert(name.to_owned(), dependencies);
    }

    /// Declare the URLs `name` stands for when it is required.
    ///
    /// A name with no override loads itself as its only URL.
    pub fn declare_urls(&self, name: &str, urls: &[&str]) {
        let urls = urls.iter().map(|&u| u.to_owned()).collect();
        self.graph().urls.insert(name.to_owned(), urls);
    }

    /// Require `names`, loading declared dependencies before dependents.
    pub fn require(&self, names: &[&str]) { self.require_impl(&to_owned_names(names), None); }

    /// Require `names` and invoke `callback` once every group is loaded.
    ///
    /// Returns the readiness subscription when completion was queued, or
    /// `None` when every group was already loaded and the callback ran
    /// synchronously.
    pub fn require_with(&self, names: &[&str], callback: ReadyFn) -> Option<SubscriptionId> {
        self.require_impl(&to_owned_names(names), Some(callback))
    }

    fn require_impl(&self, names: &[String], callback: Option<ReadyFn>) -> Option<SubscriptionId> {
        let loader = self.clone();
        self.ready_impl(
            names,
            callback,
            Some(Box::new(move |missing: &[String]| {
                for name in missing {
                    loader.require_one(name);
                }
            })),
        )
    }

    fn require_one(&self, name: &str) {
        let (dependencies, urls) = {
            let graph = self.graph();
            (
                graph.dependencies.get(name).cloned(),
                graph
                    .urls
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| vec![name.to_owned()]),
            )
        };
        match dependencies {
            Some(dependencies) if !dependencies.is_empty() => {
                // Dependencies are issued first; this name's own URLs load
                // from the continuation once they are all ready.
                let loader = self.clone();
                let name = name.to_owned();
                self.require_impl(
                    &dependencies,
                    Some(Box::new(move || {
                        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
                        loader.load_impl(&refs, Some(&name), None);
                    })),
                );
            }
            _ => {
                let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
                self.load_impl(&refs, Some(name), None);
            }
        }
    }

    /// Unload `names` and, first, every declared name that depends on them.
    ///
    /// Dependents are torn down before their dependency. A visited set
    /// bounds the traversal, so an accidental dependency cycle terminates.
    pub fn unrequire(&self, names: &[&str]) {
        let mut visited = HashSet::new();
        for name in names {
            self.unrequire_one(name, &mut visited);
        }
    }

    fn unrequire_one(&self, name: &str, visited: &mut HashSet<String>) {
        if !visited.insert(name.to_owned()) {
            return;
        }
        let dependents: Vec<String> = self
            .graph()
            .dependencies
            .iter()
            .filter(|(_, dependencies)| dependencies.iter().any(|d| d == name))
            .map(|(dependent, _)| dependent.clone())
            .collect();
        for dependent in dependents {
            self.unrequire_one(&dependent, visited);
        }
        self.unload_name(name);
    }

    /// Observe readiness of `names`.
    ///
    /// Names with no registered group are reported to `on_missing` (used
    /// by [`require`](DependencyLoader::require) to trigger lazy loading).
    /// When every named group is fully loaded, `on_ready` runs
    /// synchronously; otherwise it is subscribed under the sorted-name
    /// topic and fires when the last group completes. Level-triggered:
    /// calling again after readiness immediately re-invokes `on_ready`.
    pub fn ready(
        &self,
        names: &[&str],
        on_ready: Option<ReadyFn>,
        on_missing: Option<MissingFn>,
    ) -> Option<SubscriptionId> {
        self.ready_impl(&to_owned_names(names), on_ready, on_missing)
    }

    fn ready_impl(
        &self,
        names: &[String],
        on_ready: Option<ReadyFn>,
        on_missing: Option<MissingFn>,
    ) -> Option<SubscriptionId> {
        let kind = self.0.kind;
        let missing: Vec<String> = names
            .iter()
            .filter(|name| self.0.registry.list(kind, name).is_none())
            .cloned()
            .collect();
        if let Some(mut on_missing) = on_missing {
            if !missing.is_empty() {
                on_missing(&missing);
            }
        }

        let on_ready = on_ready?;
        if names
            .iter()
            .all(|name| self.0.registry.group_loaded(kind, name))
        {
            let mut on_ready = on_ready;
            on_ready();
            None
        } else {
            Some(self.0.bus.subscribe(Topic::new(kind, names), on_ready))
        }
    }

    /// Mark `name` trivially ready (an empty group) and sweep.
    ///
    /// Used for readiness gates unrelated to actual resource loading.
    pub fn done(&self, name: &str) {
        self.0.registry.register(self.0.kind, name, Vec::new());
        self.check();
    }

    /// Detach a callback previously queued for `names`.
    ///
    /// Tolerates an unknown topic or an already-detached subscription.
    pub fn ignore(&self, names: &[&str], subscription: SubscriptionId) {
        let topic = Topic::new(self.0.kind, names);
        self.0.bus.unsubscribe(&topic, subscription);
    }

    /// Sweep queued readiness topics, firing and clearing any whose named
    /// groups are now all fully loaded.
    ///
    /// Runs after every fetched resource completes and once per load call
    /// via the scheduler.
    pub fn check(&self) {
        let kind = self.0.kind;
        for topic in self.0.bus.topics() {
            if topic.kind() != kind {
                continue;
            }
            let ready = topic
                .names()
                .iter()
                .all(|name| self.0.registry.group_loaded(kind, name));
            if ready {
                debug!(%topic, "readiness topic complete");
                self.0.bus.flush(&topic);
            }
        }
    }
}

impl std::fmt::Debug for DependencyLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyLoader")
            .field("kind", &self.0.kind)
            .finish()
    }
}

/// Name used to track an unnamed load: the sorted canonical URL list.
fn synthetic_name(urls: &[CanonicalUrl]) -> String {
    let mut sorted: Vec<&str> = urls.iter().map(CanonicalUrl::as_str).collect();
    sorted.sort_unstable();
    format!("^{}", sorted.join("|"))
}

fn to_owned_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|&name| name.to_owned()).collect()
}
