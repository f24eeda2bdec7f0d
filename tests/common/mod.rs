//! Shared helpers for integration tests.
#![allow(dead_code, reason = "not every test binary uses every helper")]

use std::sync::{
    Arc, Mutex, Once,
    atomic::{AtomicBool, Ordering},
};

use fragnav::{
    CanonicalUrl, Method, ResourceFetcher, ResourceKind, Transport, TransportHandle,
    TransportRequest, TransportSink,
};

/// Boxed-error result used by test functions.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

static INIT: Once = Once::new();

/// Install a test tracing subscriber once per test binary.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Transport double that records exchanges and lets tests drive the sink.
#[derive(Default)]
pub struct FakeTransport {
    exchanges: Mutex<Vec<Exchange>>,
}

pub struct Exchange {
    pub url: String,
    pub method: Method,
    pub sink: TransportSink,
    pub aborted: Arc<AtomicBool>,
}

impl FakeTransport {
    pub fn count(&self) -> usize { self.exchanges.lock().expect("exchanges").len() }

    pub fn last_sink(&self) -> TransportSink {
        let exchanges = self.exchanges.lock().expect("exchanges");
        exchanges.last().expect("an exchange").sink.clone()
    }

    pub fn aborted(&self, index: usize) -> bool {
        self.exchanges.lock().expect("exchanges")[index]
            .aborted
            .load(Ordering::SeqCst)
    }
}

struct FakeHandle {
    aborted: Arc<AtomicBool>,
}

impl TransportHandle for FakeHandle {
    fn abort(&mut self) { self.aborted.store(true, Ordering::SeqCst); }
}

impl Transport for FakeTransport {
    fn start(&self, request: TransportRequest, sink: TransportSink) -> Box<dyn TransportHandle> {
        let aborted = Arc::new(AtomicBool::new(false));
        self.exchanges.lock().expect("exchanges").push(Exchange {
            url: request.url.to_string(),
            method: request.method,
            sink,
            aborted: Arc::clone(&aborted),
        });
        Box::new(FakeHandle { aborted })
    }
}

/// Fetcher double that records issued URLs and completes inline.
#[derive(Default)]
pub struct ImmediateFetcher {
    issued: Mutex<Vec<String>>,
}

impl ImmediateFetcher {
    pub fn issued(&self) -> Vec<String> { self.issued.lock().expect("issued").clone() }
}

impl ResourceFetcher for ImmediateFetcher {
    fn fetch(&self, _kind: ResourceKind, url: &CanonicalUrl, done: Box<dyn FnOnce() + Send>) {
        self.issued.lock().expect("issued").push(url.to_string());
        done();
    }
}
