//! Resource identity: kinds, canonical URLs and path configuration.
//!
//! Script and style resources are tracked by canonical URL. A canonical
//! URL is the raw URL after the kind-scoped path configuration has been
//! applied and the kind's extension appended where missing; URLs that are
//! already absolute or protocol-relative pass through untouched.

mod registry;

use std::{collections::HashMap, fmt};

pub use self::registry::{LoadStatus, ResourceRegistry};

/// The kinds of external resources the loader manages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// JavaScript resources, installed as script elements.
    Script,
    /// Stylesheet resources, installed as link elements.
    Style,
}

impl ResourceKind {
    /// Extension marker appended during canonicalization.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            ResourceKind::Script => ".js",
            ResourceKind::Style => ".css",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Script => "script",
            ResourceKind::Style => "style",
        })
    }
}

/// A resource URL after path remapping and extension normalization.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    pub(crate) fn new(url: String) -> Self { Self(url) }

    /// Borrow the canonical URL text.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    /// Consume the canonical URL, returning the owned text.
    #[must_use]
    pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str { &self.0 }
}

/// Kind-scoped path configuration applied before the extension check.
#[derive(Clone, Debug)]
pub enum PathConfig {
    /// Prefix every relative URL with a base path.
    Prefix(String),
    /// Replace the first occurrence of each key with its value.
    ///
    /// Iteration order over the map is unspecified; configurations where
    /// more than one key can match the same URL are unsupported.
    Remap(HashMap<String, String>),
}
