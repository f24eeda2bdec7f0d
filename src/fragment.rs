//! Fragment response records.
//!
//! A [`Fragment`] is one page-fragment record decoded from a navigation
//! response. The engine treats records as opaque beyond syntactic
//! well-formedness; the keys below are the vocabulary the content
//! installation layer reads when patching the document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response object keys consumed by the installation layer.
pub mod key {
    /// New document title.
    pub const TITLE: &str = "title";
    /// Canonical URL of the destination page.
    pub const URL: &str = "url";
    /// Head content (styles) to install before the body.
    pub const HEAD: &str = "head";
    /// Map of element IDs to replacement HTML.
    pub const BODY: &str = "body";
    /// Foot content (scripts) to install after the body.
    pub const FOOT: &str = "foot";
    /// Map of element IDs to attribute maps.
    pub const ATTR: &str = "attr";
    /// Name identifying the response for readiness gates.
    pub const NAME: &str = "name";
    /// Redirect destination; when present the navigation restarts there.
    pub const REDIRECT: &str = "redirect";
    /// Timing bookkeeping written by the request coordinator.
    pub const TIMING: &str = "timing";
}

/// One syntactically well-formed response record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment(Value);

impl Fragment {
    /// Wrap an already-decoded JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self { Self(value) }

    /// An empty object record, used when a stream completes with no parts.
    #[must_use]
    pub fn empty() -> Self { Self(Value::Object(Map::new())) }

    /// Borrow the underlying JSON value.
    #[must_use]
    pub fn value(&self) -> &Value { &self.0 }

    /// Consume the record, returning the owned JSON value.
    #[must_use]
    pub fn into_value(self) -> Value { self.0 }

    /// Look up a top-level field, if the record is an object.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> { self.0.get(key) }

    /// String-valued field accessor.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// The `title` field, when present.
    #[must_use]
    pub fn title(&self) -> Option<&str> { self.str_field(key::TITLE) }

    /// The `name` field, when present.
    #[must_use]
    pub fn name(&self) -> Option<&str> { self.str_field(key::NAME) }

    /// The `redirect` field, when present.
    #[must_use]
    pub fn redirect(&self) -> Option<&str> { self.str_field(key::REDIRECT) }
}

/// Timing bookkeeping attached to a completed response.
///
/// Durations are milliseconds measured from the start of the request in the
/// coordinator, merged with any phases the transport driver reported.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// Milliseconds until response headers arrived, when observed.
    pub headers_ms: Option<u64>,
    /// Milliseconds until the response body completed.
    pub complete_ms: u64,
    /// Whether the response was served from the cache.
    pub from_cache: bool,
    /// Transport-reported phases, keyed by the driver's labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub transport: BTreeMap<String, u64>,
}

/// The payload of one completed navigation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseBody {
    /// A single record.
    Single(Fragment),
    /// An ordered multipart record stream.
    Multipart(Vec<Fragment>),
}

impl ResponseBody {
    /// Collapse a decoded part list the way completed responses are stored:
    /// more than one part stays multipart, exactly one becomes a single
    /// record, and an empty stream becomes an empty record.
    #[must_use]
    pub fn from_parts(mut parts: Vec<Fragment>) -> Self {
        match parts.len() {
            0 => ResponseBody::Single(Fragment::empty()),
            1 => ResponseBody::Single(parts.remove(0)),
            _ => ResponseBody::Multipart(parts),
        }
    }

    /// View the body as an ordered slice of records.
    #[must_use]
    pub fn parts(&self) -> &[Fragment] {
        match self {
            ResponseBody::Single(fragment) => std::slice::from_ref(fragment),
            ResponseBody::Multipart(parts) => parts,
        }
    }

    /// Whether the body is a multipart record stream.
    #[must_use]
    pub fn is_multipart(&self) -> bool { matches!(self, ResponseBody::Multipart(_)) }
}

/// A completed navigation response: the record payload plus timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationResponse {
    /// The record payload.
    pub body: ResponseBody,
    /// Request timing bookkeeping.
    pub timing: Timing,
}

impl NavigationResponse {
    /// Build a response from decoded parts with the given timing.
    #[must_use]
    pub fn new(parts: Vec<Fragment>, timing: Timing) -> Self {
        Self {
            body: ResponseBody::from_parts(parts),
            timing,
        }
    }
}
