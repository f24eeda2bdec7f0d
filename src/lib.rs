#![doc(html_root_url = "https://docs.rs/fragnav/latest")]
//! Public API for the `fragnav` library.
//!
//! This crate provides the engine behind partial-page navigation: parsing
//! chunked multipart fragment-response streams, dependency-ordered
//! loading and unloading of external script and style resources, a
//! time- and size-bounded response cache, and the request coordinator
//! that ties them to an injected transport.

pub mod cache;
pub mod coordinator;
pub mod fragment;
pub mod loader;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod multipart;
pub mod readiness;
pub mod resource;
pub mod scheduler;

pub use cache::ResponseCache;
pub use coordinator::{
    ConfigError,
    CoordinatorConfig,
    Method,
    RequestCallbacks,
    RequestCoordinator,
    RequestError,
    RequestOptions,
    RequestState,
    RequestType,
    Transport,
    TransportError,
    TransportHandle,
    TransportRequest,
    TransportSink,
    TransportTiming,
};
pub use fragment::{Fragment, NavigationResponse, ResponseBody, Timing};
pub use loader::{DependencyLoader, LoaderHooks, ResourceFetcher};
pub use multipart::{BEGIN, DELIMITER, END, ParseError, ParseResult, StreamParser, parse};
pub use readiness::{ReadinessBus, ReadyFn, SubscriptionId, Topic};
pub use resource::{CanonicalUrl, LoadStatus, PathConfig, ResourceKind, ResourceRegistry};
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};
