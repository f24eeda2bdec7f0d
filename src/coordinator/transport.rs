//! Transport boundary for navigation requests.
//!
//! The coordinator never talks to the network itself. A [`Transport`]
//! implementation starts the request described by [`TransportRequest`] and
//! feeds what happens into the [`TransportSink`](super::TransportSink) it
//! was handed: headers, body chunks, then completion or failure. The
//! returned [`TransportHandle`] lets the coordinator abort the exchange
//! when a newer request supersedes it.

use std::{fmt, time::Duration};

use thiserror::Error;
use url::Url;

use super::TransportSink;

/// HTTP-ish request method, as far as the engine cares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
    /// Idempotent fetch; eligible for cache reads and writes.
    #[default]
    Get,
    /// Non-idempotent submit; bypasses the cache entirely.
    Post,
}

impl Method {
    /// Wire form of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Everything a transport needs to issue one request.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    /// Fully-qualified URL, identifier parameter included.
    pub url: Url,
    /// Request method.
    pub method: Method,
    /// Additional request headers.
    pub headers: Vec<(String, String)>,
    /// Overall deadline, when configured.
    pub timeout: Option<Duration>,
}

/// Control handle for an in-flight transport exchange.
pub trait TransportHandle: Send {
    /// Abort the exchange. No further sink events may be delivered.
    fn abort(&mut self);
}

/// Port implemented by the embedding transport layer.
pub trait Transport: Send + Sync {
    /// Begin the exchange, reporting progress through `sink`.
    fn start(&self, request: TransportRequest, sink: TransportSink) -> Box<dyn TransportHandle>;
}

/// Failure reported by the transport layer.
///
/// Never retried by the engine; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured deadline elapsed.
    #[error("request timed out")]
    TimedOut,
    /// Any other transport-level failure.
    #[error("transport failure: {0}")]
    Failed(String),
}

/// Timing phases measured by the transport driver, merged into the
/// response timing on completion.
#[derive(Clone, Debug, Default)]
pub struct TransportTiming {
    /// Labelled phase durations, e.g. connect or first-byte times.
    pub phases: Vec<(String, Duration)>,
}

impl TransportTiming {
    /// Timing with no recorded phases.
    #[must_use]
    pub fn none() -> Self { Self::default() }

    /// Record one labelled phase.
    #[must_use]
    pub fn phase(mut self, label: impl Into<String>, duration: Duration) -> Self {
        self.phases.push((label.into(), duration));
        self
    }
}
