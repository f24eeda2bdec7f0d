//! Metric helpers for `fragnav`.
//!
//! This module defines metric names and simple helper functions wrapping
//! the [`metrics`](https://docs.rs/metrics) crate. Compiled only with the
//! `metrics` feature (on by default); exporters are the embedder's
//! concern.

use metrics::counter;

use crate::resource::ResourceKind;

/// Name of the counter tracking decoded response records.
pub const PARTS_DECODED: &str = "fragnav_parts_decoded_total";
/// Name of the counter tracking resource loads issued to the fetcher.
pub const RESOURCE_LOADS: &str = "fragnav_resource_loads_total";
/// Name of the counter tracking cache evictions.
pub const CACHE_EVICTIONS: &str = "fragnav_cache_evictions_total";

/// Record `count` decoded response records.
pub fn inc_parts_decoded(count: u64) { counter!(PARTS_DECODED).increment(count); }

/// Record one resource load issued for the given kind.
pub fn inc_resource_loads(kind: ResourceKind) {
    let kind = match kind {
        ResourceKind::Script => "script",
        ResourceKind::Style => "style",
    };
    counter!(RESOURCE_LOADS, "kind" => kind).increment(1);
}

/// Record `count` cache entries evicted by expiry or the size bound.
pub fn inc_cache_evictions(count: u64) { counter!(CACHE_EVICTIONS).increment(count); }
