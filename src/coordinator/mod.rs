//! Request coordination: one navigation request at a time.
//!
//! `RequestCoordinator` owns a single logical request slot. Each
//! [`send`](RequestCoordinator::send) consults the response cache, and on
//! a miss drives the injected [`Transport`], feeding body chunks through a
//! [`StreamParser`] and delivering each decoded record to the caller as it
//! arrives. Completed responses are cached (GET only) and handed to the
//! success callback; starting a new request aborts whatever the slot was
//! doing before.
//!
//! Cache hits complete through the scheduler, never inside `send`, so the
//! caller observes every request as asynchronous.

mod config;
mod error;
mod transport;

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::{debug, warn};

pub use self::{
    config::{ConfigError, CoordinatorConfig, CoordinatorConfigBuilder},
    error::RequestError,
    transport::{
        Method, Transport, TransportError, TransportHandle, TransportRequest, TransportTiming,
    },
};
use crate::{
    cache::ResponseCache,
    fragment::{Fragment, NavigationResponse, Timing},
    multipart::{ParseError, StreamParser, parse},
    scheduler::Scheduler,
};

/// Request type identifier sent with the transport URL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestType {
    /// Forward navigation to a new page.
    Navigate,
    /// History navigation backwards.
    NavigateBack,
    /// History navigation forwards.
    NavigateForward,
    /// Speculative fetch to warm the cache.
    Prefetch,
    /// In-place load of fragment content.
    #[default]
    Load,
}

impl RequestType {
    /// Identifier value appended to the transport URL.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RequestType::Navigate => "navigate",
            RequestType::NavigateBack => "navigate-back",
            RequestType::NavigateForward => "navigate-forward",
            RequestType::Prefetch => "prefetch",
            RequestType::Load => "load",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Per-request options.
#[derive(Debug, Default)]
pub struct RequestOptions {
    /// Request method; POST responses are never cached.
    pub method: Method,
    /// Request type identifier for the transport URL.
    pub request_type: RequestType,
    /// Additional request headers.
    pub headers: Vec<(String, String)>,
}

/// Callback invoked for each decoded record, in stream order.
pub type PartFn = Box<dyn FnMut(&str, &Fragment) + Send>;
/// Callback invoked once on successful completion.
pub type SuccessFn = Box<dyn FnOnce(&str, NavigationResponse) + Send>;
/// Callback invoked once on failure.
pub type ErrorFn = Box<dyn FnOnce(&str, RequestError) + Send>;

/// Caller notifications for one request.
///
/// `on_part` fires once per decoded record; `on_success` or `on_error`
/// fires exactly once afterwards. A cancelled request fires nothing
/// further.
#[derive(Default)]
pub struct RequestCallbacks {
    on_part: Option<PartFn>,
    on_success: Option<SuccessFn>,
    on_error: Option<ErrorFn>,
}

impl RequestCallbacks {
    /// Callbacks with nothing registered.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register the per-record callback.
    #[must_use]
    pub fn on_part(mut self, callback: impl FnMut(&str, &Fragment) + Send + 'static) -> Self {
        self.on_part = Some(Box::new(callback));
        self
    }

    /// Register the completion callback.
    #[must_use]
    pub fn on_success(
        mut self,
        callback: impl FnOnce(&str, NavigationResponse) + Send + 'static,
    ) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Register the failure callback.
    #[must_use]
    pub fn on_error(
        mut self,
        callback: impl FnOnce(&str, RequestError) + Send + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for RequestCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCallbacks")
            .field("on_part", &self.on_part.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Lifecycle of the coordinator's request slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestState {
    /// No request has been started.
    #[default]
    Idle,
    /// A request is being served, from the transport or the cache.
    InFlight,
    /// The most recent request completed successfully.
    Done,
    /// The most recent request was superseded or cancelled.
    Canceled,
    /// The most recent request failed.
    Failed,
}

struct ActiveRequest {
    url: String,
    cache_key: String,
    method: Method,
    multipart: bool,
    parser: StreamParser,
    body: String,
    delivered: Vec<Fragment>,
    callbacks: RequestCallbacks,
    handle: Option<Box<dyn TransportHandle>>,
    started_at: Instant,
    headers_at: Option<Instant>,
}

#[derive(Default)]
struct SlotState {
    phase: RequestState,
    generation: u64,
    active: Option<ActiveRequest>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    transport: Arc<dyn Transport>,
    cache: ResponseCache<NavigationResponse>,
    scheduler: Arc<dyn Scheduler>,
    slot: Mutex<SlotState>,
}

/// Cloneable handle to one request slot.
#[derive(Clone)]
pub struct RequestCoordinator(Arc<CoordinatorInner>);

/// Event sink handed to the transport for one exchange.
///
/// Carries the generation of the request it belongs to; events from a
/// superseded exchange are discarded. Cloneable so drivers can report
/// from wherever the exchange is being serviced.
#[derive(Clone)]
pub struct TransportSink {
    coordinator: RequestCoordinator,
    generation: u64,
}

impl TransportSink {
    /// Deliver the response headers.
    pub fn headers(&self, headers: &[(String, String)]) {
        self.coordinator.on_headers(self.generation, headers);
    }

    /// Deliver one body chunk.
    pub fn chunk(&self, text: &str) { self.coordinator.on_chunk(self.generation, text); }

    /// Signal successful completion of the exchange.
    pub fn done(&self, timing: TransportTiming) {
        self.coordinator.on_done(self.generation, timing);
    }

    /// Signal failure of the exchange.
    pub fn failed(&self, error: TransportError) {
        self.coordinator.fail(self.generation, RequestError::Transport(error));
    }
}

impl fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSink")
            .field("generation", &self.generation)
            .finish()
    }
}

impl RequestCoordinator {
    /// Create a coordinator with its own unbounded response cache.
    #[must_use]
    pub fn new(
        config: CoordinatorConfig,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let cache = ResponseCache::new(Arc::clone(&scheduler));
        Self::with_cache(config, transport, scheduler, cache)
    }

    /// Create a coordinator over a shared response cache.
    #[must_use]
    pub fn with_cache(
        config: CoordinatorConfig,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        cache: ResponseCache<NavigationResponse>,
    ) -> Self {
        Self(Arc::new(CoordinatorInner {
            config,
            transport,
            cache,
            scheduler,
            slot: Mutex::new(SlotState::default()),
        }))
    }

    /// The response cache this coordinator consults.
    #[must_use]
    pub fn cache(&self) -> &ResponseCache<NavigationResponse> { &self.0.cache }

    /// Current lifecycle state of the request slot.
    #[must_use]
    pub fn state(&self) -> RequestState { self.slot().phase }

    fn slot(&self) -> MutexGuard<'_, SlotState> {
        self.0.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a request for `url`, cancelling whatever the slot was doing.
    ///
    /// A fresh cached response completes asynchronously without touching
    /// the transport, still firing `on_part` per record for multipart
    /// entries. Otherwise the transport is driven and records are
    /// delivered as they decode.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidUrl`] when `url` cannot be resolved
    /// against the configured base. Asynchronous failures are reported
    /// through the `on_error` callback instead.
    pub fn send(
        &self,
        url: &str,
        options: RequestOptions,
        callbacks: RequestCallbacks,
    ) -> Result<(), RequestError> {
        let absolute = self
            .0
            .config
            .base()
            .join(url)
            .map_err(|source| RequestError::InvalidUrl {
                url: url.to_owned(),
                source,
            })?;
        let cache_key = absolute.to_string();

        self.cancel();
        let generation = {
            let mut slot = self.slot();
            slot.generation += 1;
            slot.phase = RequestState::InFlight;
            slot.generation
        };

        if options.method == Method::Get {
            if let Some(response) = self.0.cache.get(&cache_key) {
                debug!(url, "cache hit, synthesizing navigation response");
                let coordinator = self.clone();
                let url = url.to_owned();
                self.0.scheduler.defer(Box::new(move || {
                    coordinator.complete_from_cache(generation, &url, response, callbacks);
                }));
                return Ok(());
            }
        }

        let mut transport_url = absolute;
        transport_url
            .query_pairs_mut()
            .append_pair(self.0.config.identifier_param(), options.request_type.as_str());
        debug!(url, %transport_url, method = %options.method, "starting transport request");

        self.slot().active = Some(ActiveRequest {
            url: url.to_owned(),
            cache_key,
            method: options.method,
            multipart: false,
            parser: StreamParser::new(),
            body: String::new(),
            delivered: Vec::new(),
            callbacks,
            handle: None,
            started_at: Instant::now(),
            headers_at: None,
        });

        let request = TransportRequest {
            url: transport_url,
            method: options.method,
            headers: options.headers,
            timeout: self.0.config.request_timeout(),
        };
        let sink = TransportSink {
            coordinator: self.clone(),
            generation,
        };
        let handle = self.0.transport.start(request, sink);

        // The transport may have completed synchronously; keep the handle
        // only while this exchange is still the current one.
        let mut slot = self.slot();
        if slot.generation == generation && slot.active.is_some() {
            if let Some(active) = slot.active.as_mut() {
                active.handle = Some(handle);
            }
        } else {
            drop(slot);
            let mut handle = handle;
            handle.abort();
        }
        Ok(())
    }

    /// Abort the in-flight request, if any. No further callbacks fire for
    /// the aborted request.
    pub fn cancel(&self) {
        let handle = {
            let mut slot = self.slot();
            if slot.phase != RequestState::InFlight {
                return;
            }
            slot.phase = RequestState::Canceled;
            slot.active.take().and_then(|mut active| active.handle.take())
        };
        debug!("navigation request cancelled");
        if let Some(mut handle) = handle {
            handle.abort();
        }
    }

    fn matches(slot: &SlotState, generation: u64) -> bool {
        slot.generation == generation && slot.phase == RequestState::InFlight
    }

    fn on_headers(&self, generation: u64, headers: &[(String, String)]) {
        let mut slot = self.slot();
        if !Self::matches(&slot, generation) {
            return;
        }
        let Some(active) = slot.active.as_mut() else {
            return;
        };
        active.headers_at = Some(Instant::now());
        let header = self.0.config.multipart_header();
        active.multipart = headers.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case(header) && value.to_ascii_lowercase().contains("multipart")
        });
        if active.multipart {
            debug!(url = %active.url, "response is multipart framed");
        }
    }

    fn on_chunk(&self, generation: u64, text: &str) {
        enum Step {
            Ignore,
            Deliver(String, Vec<Fragment>, Option<PartFn>),
            Fail(ParseError),
        }

        let step = {
            let mut slot = self.slot();
            if !Self::matches(&slot, generation) {
                Step::Ignore
            } else if let Some(active) = slot.active.as_mut() {
                active.body.push_str(text);
                if active.multipart {
                    match active.parser.push_chunk(text) {
                        Ok(parts) if parts.is_empty() => Step::Ignore,
                        Ok(parts) => {
                            active.delivered.extend(parts.iter().cloned());
                            Step::Deliver(
                                active.url.clone(),
                                parts,
                                active.callbacks.on_part.take(),
                            )
                        }
                        Err(err) => Step::Fail(err),
                    }
                } else {
                    Step::Ignore
                }
            } else {
                Step::Ignore
            }
        };

        match step {
            Step::Ignore => {}
            Step::Deliver(url, parts, mut on_part) => {
                #[cfg(feature = "metrics")]
                crate::metrics::inc_parts_decoded(parts.len() as u64);
                if let Some(on_part) = on_part.as_mut() {
                    for part in &parts {
                        on_part(&url, part);
                    }
                }
                let mut slot = self.slot();
                if slot.generation == generation {
                    if let Some(active) = slot.active.as_mut() {
                        active.callbacks.on_part = on_part;
                    }
                }
            }
            Step::Fail(err) => self.fail(generation, RequestError::Parse(err)),
        }
    }

    fn on_done(&self, generation: u64, transport_timing: TransportTiming) {
        struct Completion {
            url: String,
            cache_key: String,
            method: Method,
            new_parts: Vec<Fragment>,
            on_part: Option<PartFn>,
            on_success: Option<SuccessFn>,
            response: NavigationResponse,
        }

        let completion = {
            let mut slot = self.slot();
            if !Self::matches(&slot, generation) {
                return;
            }
            let Some(mut active) = slot.active.take() else {
                return;
            };
            match finalize_parts(&mut active) {
                Ok(new_parts) => {
                    slot.phase = RequestState::Done;
                    let timing = Timing {
                        headers_ms: active
                            .headers_at
                            .map(|at| millis(at.saturating_duration_since(active.started_at))),
                        complete_ms: millis(active.started_at.elapsed()),
                        from_cache: false,
                        transport: transport_timing
                            .phases
                            .into_iter()
                            .map(|(label, duration)| (label, millis(duration)))
                            .collect(),
                    };
                    let mut parts = std::mem::take(&mut active.delivered);
                    parts.extend(new_parts.iter().cloned());
                    Ok(Completion {
                        url: active.url,
                        cache_key: active.cache_key,
                        method: active.method,
                        new_parts,
                        on_part: active.callbacks.on_part.take(),
                        on_success: active.callbacks.on_success.take(),
                        response: NavigationResponse::new(parts, timing),
                    })
                }
                Err(err) => {
                    slot.phase = RequestState::Failed;
                    Err((active.url, active.callbacks.on_error.take(), err))
                }
            }
        };

        match completion {
            Ok(mut completion) => {
                #[cfg(feature = "metrics")]
                crate::metrics::inc_parts_decoded(completion.new_parts.len() as u64);
                if let Some(on_part) = completion.on_part.as_mut() {
                    for part in &completion.new_parts {
                        on_part(&completion.url, part);
                    }
                }
                if completion.method != Method::Post {
                    self.0.cache.set(
                        completion.cache_key,
                        completion.response.clone(),
                        self.0.config.cache_lifetime(),
                    );
                }
                debug!(url = %completion.url, "navigation request complete");
                if let Some(on_success) = completion.on_success {
                    on_success(&completion.url, completion.response);
                }
            }
            Err((url, on_error, err)) => {
                warn!(%url, error = %err, "navigation response failed to parse");
                if let Some(on_error) = on_error {
                    on_error(&url, RequestError::Parse(err));
                }
            }
        }
    }

    fn fail(&self, generation: u64, error: RequestError) {
        let (url, handle, on_error) = {
            let mut slot = self.slot();
            if !Self::matches(&slot, generation) {
                return;
            }
            slot.phase = RequestState::Failed;
            let Some(mut active) = slot.active.take() else {
                return;
            };
            (
                active.url,
                active.handle.take(),
                active.callbacks.on_error.take(),
            )
        };
        warn!(%url, error = %error, "navigation request failed");
        if let Some(mut handle) = handle {
            handle.abort();
        }
        if let Some(on_error) = on_error {
            on_error(&url, error);
        }
    }

    fn complete_from_cache(
        &self,
        generation: u64,
        url: &str,
        mut response: NavigationResponse,
        callbacks: RequestCallbacks,
    ) {
        {
            let mut slot = self.slot();
            if !Self::matches(&slot, generation) {
                return;
            }
            slot.phase = RequestState::Done;
        }
        response.timing = Timing {
            from_cache: true,
            ..Timing::default()
        };
        let RequestCallbacks {
            mut on_part,
            on_success,
            ..
        } = callbacks;
        if response.body.is_multipart() {
            if let Some(on_part) = on_part.as_mut() {
                for part in response.body.parts() {
                    on_part(url, part);
                }
            }
        }
        if let Some(on_success) = on_success {
            on_success(url, response);
        }
    }
}

impl fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("state", &self.state())
            .finish()
    }
}

/// Decode whatever the completed stream still owes beyond the parts
/// already delivered.
///
/// Multipart streams with non-blank trailing text get one last-ditch scan;
/// if that fails and nothing was delivered yet, the whole accumulated body
/// is decoded once in single mode (a server that never framed the
/// stream). Non-multipart bodies are decoded in single mode.
fn finalize_parts(active: &mut ActiveRequest) -> Result<Vec<Fragment>, ParseError> {
    if !active.multipart {
        return parse(&active.body, false, false).map(|result| result.parts);
    }
    if active.parser.extra().trim().is_empty() {
        return Ok(Vec::new());
    }
    let recovered = match active.parser.finish() {
        Ok(parts) => parts,
        Err(err) => {
            if active.delivered.is_empty() {
                return parse(&active.body, false, false).map(|result| result.parts);
            }
            return Err(err);
        }
    };
    if active.parser.extra().trim().is_empty() {
        return Ok(recovered);
    }
    // The last-ditch scan left unconsumed text, so the stream was never
    // actually token framed.
    if active.delivered.is_empty() && recovered.is_empty() {
        parse(&active.body, false, false).map(|result| result.parts)
    } else {
        parse(active.parser.extra(), false, false).map(|result| result.parts)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
