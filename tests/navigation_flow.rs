//! End-to-end flow: decoded response parts drive the resource loader.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use fragnav::{
    BEGIN, CoordinatorConfig, DELIMITER, DependencyLoader, END, ManualScheduler,
    RequestCallbacks, RequestCoordinator, RequestOptions, RequestState, RequestType,
    ResourceKind, ResourceRegistry, Scheduler, TokioScheduler, Transport, TransportTiming,
};
use rstest::rstest;
use serde_json::Value;

mod common;
use common::{FakeTransport, ImmediateFetcher, TestResult, init_tracing};

fn multipart_headers() -> Vec<(String, String)> {
    vec![("X-Response-Type".to_owned(), "multipart".to_owned())]
}

/// Installer behaviour at the DOM boundary: every part naming scripts in
/// its `foot` field loads them under the part's `name`.
fn installing_callbacks(loader: &DependencyLoader) -> RequestCallbacks {
    let loader = loader.clone();
    RequestCallbacks::new().on_part(move |_, part| {
        let Some(name) = part.name() else { return };
        let Some(foot) = part.field("foot").and_then(Value::as_array) else {
            return;
        };
        let urls: Vec<&str> = foot.iter().filter_map(Value::as_str).collect();
        loader.load(&urls, Some(name));
    })
}

#[test]
fn navigation_parts_install_their_scripts() -> TestResult {
    init_tracing();
    let scheduler = Arc::new(ManualScheduler::new());
    let transport = Arc::new(FakeTransport::default());
    let fetcher = Arc::new(ImmediateFetcher::default());
    let loader = DependencyLoader::new(
        ResourceKind::Script,
        Arc::new(ResourceRegistry::new()),
        Arc::clone(&fetcher) as _,
        Arc::clone(&scheduler) as Arc<dyn Scheduler>,
    );
    let coordinator = RequestCoordinator::new(
        CoordinatorConfig::builder().base("https://app.example/").build()?,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&scheduler) as Arc<dyn Scheduler>,
    );

    coordinator.send(
        "/page",
        RequestOptions {
            request_type: RequestType::Navigate,
            ..RequestOptions::default()
        },
        installing_callbacks(&loader),
    )?;
    let sink = transport.last_sink();
    sink.headers(&multipart_headers());
    sink.chunk(&format!(
        "{BEGIN}{}{DELIMITER}{}{END}",
        r#"{"name": "header", "foot": ["header"]}"#,
        r#"{"name": "detail", "foot": ["detail"]}"#
    ));
    sink.done(TransportTiming::none());
    scheduler.run();

    assert_eq!(coordinator.state(), RequestState::Done);
    assert_eq!(fetcher.issued(), ["header.js", "detail.js"]);

    // Both groups installed, so readiness fires synchronously.
    let ready = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&ready);
    let subscription = loader.ready(
        &["header", "detail"],
        Some(Box::new(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        })),
        None,
    );
    assert!(subscription.is_none());
    assert_eq!(ready.load(Ordering::SeqCst), 1);

    // Repeating the navigation replays from the cache: no transport
    // exchange, no re-issued loads, but the installer still runs.
    coordinator.send(
        "/page",
        RequestOptions {
            request_type: RequestType::Navigate,
            ..RequestOptions::default()
        },
        installing_callbacks(&loader),
    )?;
    scheduler.run();
    assert_eq!(transport.count(), 1);
    assert_eq!(fetcher.issued(), ["header.js", "detail.js"]);
    assert_eq!(coordinator.state(), RequestState::Done);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn short_circuited_loads_complete_on_the_tokio_scheduler() -> TestResult {
    init_tracing();
    let loader = DependencyLoader::new(
        ResourceKind::Script,
        Arc::new(ResourceRegistry::new()),
        Arc::new(ImmediateFetcher::default()) as _,
        Arc::new(TokioScheduler) as Arc<dyn Scheduler>,
    );
    loader.load(&["app"], Some("app"));

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let tx = Mutex::new(Some(tx));
    loader.load_with(
        &["app"],
        Some("app"),
        Box::new(move || {
            if let Some(tx) = tx.lock().expect("sender").take() {
                let _ = tx.send(());
            }
        }),
    );
    // The already-loaded group completes on a scheduler tick, not inline.
    rx.await?;
    Ok(())
}
