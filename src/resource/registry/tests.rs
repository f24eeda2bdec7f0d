//! Unit tests for resource canonicalization and bookkeeping.

use std::collections::HashMap;

use super::ResourceRegistry;
use crate::resource::{CanonicalUrl, PathConfig, ResourceKind};

fn canon(registry: &ResourceRegistry, url: &str) -> String {
    registry
        .canonicalize(ResourceKind::Script, url)
        .into_string()
}

#[test]
fn canonicalize_appends_the_kind_extension() {
    let registry = ResourceRegistry::new();
    assert_eq!(canon(&registry, "app"), "app.js");
    assert_eq!(
        registry
            .canonicalize(ResourceKind::Style, "theme")
            .into_string(),
        "theme.css"
    );
}

#[test]
fn canonicalize_keeps_urls_that_already_carry_the_extension() {
    let registry = ResourceRegistry::new();
    assert_eq!(canon(&registry, "app.js"), "app.js");
    // Containment, not suffix: a versioned URL already carries the marker.
    assert_eq!(canon(&registry, "app.js?v=2"), "app.js?v=2");
}

#[test]
fn canonicalize_passes_absolute_urls_through() {
    let registry = ResourceRegistry::new();
    registry.set_path(ResourceKind::Script, PathConfig::Prefix("/static/".into()));
    for url in [
        "//host/app",
        "http://host/app",
        "https://host/app",
        "file://host/app",
    ] {
        assert_eq!(canon(&registry, url), url);
    }
}

#[test]
fn canonicalize_applies_a_prefix_path() {
    let registry = ResourceRegistry::new();
    registry.set_path(ResourceKind::Script, PathConfig::Prefix("/static/".into()));
    assert_eq!(canon(&registry, "app"), "/static/app.js");
}

#[test]
fn canonicalize_applies_first_match_replacements() {
    let registry = ResourceRegistry::new();
    let map: HashMap<String, String> =
        [("dev/".to_owned(), "build/min/".to_owned())].into_iter().collect();
    registry.set_path(ResourceKind::Script, PathConfig::Remap(map));
    assert_eq!(canon(&registry, "dev/app"), "build/min/app.js");
    assert_eq!(canon(&registry, "other/app"), "other/app.js");
}

#[test]
fn canonicalize_keeps_empty_urls_empty() {
    let registry = ResourceRegistry::new();
    assert_eq!(canon(&registry, ""), "");
}

#[test]
fn status_round_trips_loading_and_loaded() {
    let registry = ResourceRegistry::new();
    let url = registry.canonicalize(ResourceKind::Script, "app");

    assert!(!registry.exists(ResourceKind::Script, &url));
    assert!(!registry.loaded(ResourceKind::Script, &url));

    registry.mark_loading(ResourceKind::Script, &url);
    assert!(registry.exists(ResourceKind::Script, &url));
    assert!(!registry.loaded(ResourceKind::Script, &url));

    registry.mark_loaded(ResourceKind::Script, &url);
    assert!(registry.exists(ResourceKind::Script, &url));
    assert!(registry.loaded(ResourceKind::Script, &url));

    registry.forget(ResourceKind::Script, &url);
    assert!(!registry.exists(ResourceKind::Script, &url));
}

#[test]
fn statuses_are_scoped_by_kind() {
    let registry = ResourceRegistry::new();
    let url = CanonicalUrl::new("shared.js".into());
    registry.mark_loaded(ResourceKind::Script, &url);
    assert!(!registry.exists(ResourceKind::Style, &url));
}

#[test]
fn loaded_is_vacuously_true_for_an_empty_url() {
    let registry = ResourceRegistry::new();
    let empty = registry.canonicalize(ResourceKind::Script, "");
    assert!(registry.loaded(ResourceKind::Script, &empty));
}

#[test]
fn groups_register_list_and_unregister() {
    let registry = ResourceRegistry::new();
    let urls = vec![registry.canonicalize(ResourceKind::Script, "a")];
    registry.register(ResourceKind::Script, "app", urls.clone());

    assert_eq!(registry.list(ResourceKind::Script, "app"), Some(urls.clone()));
    assert_eq!(registry.unregister(ResourceKind::Script, "app"), Some(urls));
    assert_eq!(registry.list(ResourceKind::Script, "app"), None);
    assert_eq!(registry.unregister(ResourceKind::Script, "app"), None);
}

#[test]
fn group_loaded_requires_registration_and_every_url() {
    let registry = ResourceRegistry::new();
    assert!(!registry.group_loaded(ResourceKind::Script, "app"));

    let a = registry.canonicalize(ResourceKind::Script, "a");
    let b = registry.canonicalize(ResourceKind::Script, "b");
    registry.register(ResourceKind::Script, "app", vec![a.clone(), b.clone()]);
    assert!(!registry.group_loaded(ResourceKind::Script, "app"));

    registry.mark_loaded(ResourceKind::Script, &a);
    assert!(!registry.group_loaded(ResourceKind::Script, "app"));
    registry.mark_loaded(ResourceKind::Script, &b);
    assert!(registry.group_loaded(ResourceKind::Script, "app"));

    // An empty group is trivially loaded.
    registry.register(ResourceKind::Script, "gate", Vec::new());
    assert!(registry.group_loaded(ResourceKind::Script, "gate"));
}
