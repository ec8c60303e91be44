//! Watcher lifecycle against a live registry: reloads on recognized changes,
//! keeps serving on failures, and shuts down cleanly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use routeswap::config::Config;
use routeswap::error::RouteError;
use routeswap::loader::TableLoader;
use routeswap::model::RouteRecord;
use routeswap::registry::{RouteTableRegistry, SharedRegistry};
use routeswap::resolver::Resolver;
use routeswap::source::{FileSource, MockSource, RecordSource};
use routeswap::watcher::{ChangeNotification, ChannelFeed, UpdateWatcher};

fn fast_config() -> Config {
    Config {
        poll_interval_ms: 5,
        ..Config::default()
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Source whose availability can be toggled at runtime.
struct FlakySource {
    inner: MockSource,
    down: AtomicBool,
}

impl RecordSource for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    fn fetch(&self) -> Result<Vec<RouteRecord>, RouteError> {
        if self.down.load(Ordering::Relaxed) {
            return Err(RouteError::Load("source offline".to_string()));
        }
        self.inner.fetch()
    }
}

/// Source whose fetch parks on a gate once armed, so a reload can be held
/// mid-load.
struct GatedSource {
    inner: MockSource,
    armed: AtomicBool,
    entered: Sender<()>,
    release: Receiver<()>,
}

impl RecordSource for GatedSource {
    fn name(&self) -> &str {
        "gated"
    }

    fn fetch(&self) -> Result<Vec<RouteRecord>, RouteError> {
        if self.armed.load(Ordering::Relaxed) {
            let _ = self.entered.send(());
            self.release
                .recv()
                .map_err(|_| RouteError::Load("gate closed".to_string()))?;
        }
        self.inner.fetch()
    }
}

fn start(source: Arc<dyn RecordSource>) -> (SharedRegistry, TableLoader) {
    let loader = TableLoader::new(source);
    let registry = RouteTableRegistry::shared(loader.load().unwrap());
    (registry, loader)
}

#[test]
fn recognized_notification_triggers_reload() {
    let source = Arc::new(MockSource::default());
    let (registry, loader) = start(source.clone());
    let resolver = Resolver::new(Arc::clone(&registry));
    assert_eq!(resolver.resolve("3").unwrap().destination_url, "url:30");

    let (tx, feed) = ChannelFeed::channel(16);
    let handle = UpdateWatcher::new(loader, Arc::clone(&registry), &fast_config())
        .spawn(feed)
        .unwrap();

    source.bump();
    tx.send(ChangeNotification::now("MMSCInfo")).unwrap();

    assert!(wait_for(Duration::from_secs(5), || registry.generation() == 2));
    assert_eq!(resolver.resolve("3").unwrap().destination_url, "url:31");

    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.installs, 1);
    assert_eq!(stats.failures, 0);
    assert!(stats.ticks >= 1);
}

#[test]
fn unrecognized_notification_is_ignored() {
    let (registry, loader) = start(Arc::new(MockSource::default()));
    let (tx, feed) = ChannelFeed::channel(16);
    let handle = UpdateWatcher::new(loader, Arc::clone(&registry), &fast_config())
        .spawn(feed)
        .unwrap();

    tx.send(ChangeNotification::now("Location")).unwrap();
    tx.send(ChangeNotification::now("Gateway")).unwrap();

    assert!(wait_for(Duration::from_secs(5), || tx.is_empty()));
    thread::sleep(Duration::from_millis(30));

    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.ignored, 2);
    assert_eq!(stats.installs, 0);
    assert_eq!(registry.generation(), 1);
}

#[test]
fn failed_reload_keeps_serving_then_recovers() {
    let source = Arc::new(FlakySource {
        inner: MockSource::default(),
        down: AtomicBool::new(false),
    });
    let (registry, loader) = start(source.clone());
    let resolver = Resolver::new(Arc::clone(&registry));
    let before = registry.current();

    let (tx, feed) = ChannelFeed::channel(16);
    let handle = UpdateWatcher::new(loader, Arc::clone(&registry), &fast_config())
        .spawn(feed)
        .unwrap();

    source.down.store(true, Ordering::Relaxed);
    tx.send(ChangeNotification::now("MMSCInfo")).unwrap();
    assert!(wait_for(Duration::from_secs(5), || tx.is_empty()));
    thread::sleep(Duration::from_millis(30));

    // Still the initial table, still answering.
    assert!(Arc::ptr_eq(&before, &registry.current()));
    assert_eq!(resolver.resolve("5").unwrap().device_id, "device:5");

    // No automatic retry: the next change is what reloads.
    source.down.store(false, Ordering::Relaxed);
    source.inner.bump();
    tx.send(ChangeNotification::now("MMSCInfo")).unwrap();
    assert!(wait_for(Duration::from_secs(5), || registry.generation() == 2));
    assert_eq!(resolver.resolve("5").unwrap().destination_url, "url:51");

    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.installs, 1);
    assert_eq!(stats.changes_detected, 2);
}

#[test]
fn malformed_file_never_published() {
    let path = std::env::temp_dir().join("routeswap_watcher_file.json");
    std::fs::write(
        &path,
        r#"[{"key":"5","device_id":"device:5","destination_url":"url:50","max_payload_bytes":5}]"#,
    )
    .unwrap();

    let (registry, loader) = start(Arc::new(FileSource::new(&path)));
    let resolver = Resolver::new(Arc::clone(&registry));
    let (tx, feed) = ChannelFeed::channel(16);
    let handle = UpdateWatcher::new(loader, Arc::clone(&registry), &fast_config())
        .spawn(feed)
        .unwrap();

    // Duplicate key: the build must reject it as a whole.
    std::fs::write(
        &path,
        r#"[{"key":"5","device_id":"device:5","destination_url":"url:51","max_payload_bytes":5},
            {"key":"5","device_id":"device:5","destination_url":"url:52","max_payload_bytes":5}]"#,
    )
    .unwrap();
    tx.send(ChangeNotification::now("MMSCInfo")).unwrap();
    assert!(wait_for(Duration::from_secs(5), || tx.is_empty()));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(resolver.resolve("5").unwrap().destination_url, "url:50");

    // Negative size: rejected too.
    std::fs::write(
        &path,
        r#"[{"key":"5","device_id":"device:5","destination_url":"url:53","max_payload_bytes":-1}]"#,
    )
    .unwrap();
    tx.send(ChangeNotification::now("MMSCInfo")).unwrap();
    assert!(wait_for(Duration::from_secs(5), || tx.is_empty()));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(resolver.resolve("5").unwrap().destination_url, "url:50");

    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.failures, 2);
    assert_eq!(registry.generation(), 1);

    std::fs::remove_file(&path).ok();
}

#[test]
fn shutdown_is_prompt_with_long_poll_interval() {
    let (registry, loader) = start(Arc::new(MockSource::default()));
    let config = Config {
        poll_interval_ms: 60_000,
        ..Config::default()
    };
    let (_tx, feed) = ChannelFeed::channel(1);
    let handle = UpdateWatcher::new(loader, registry, &config)
        .spawn(feed)
        .unwrap();

    let start = Instant::now();
    let stats = handle.shutdown().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(stats.ticks, 0);
}

#[test]
fn dropping_handle_stops_watcher() {
    let (registry, loader) = start(Arc::new(MockSource::default()));
    let (tx, feed) = ChannelFeed::channel(4);
    let handle = UpdateWatcher::new(loader, Arc::clone(&registry), &fast_config())
        .spawn(feed)
        .unwrap();
    drop(handle);

    // Feed receiver went away with the watcher thread.
    assert!(tx.send(ChangeNotification::now("MMSCInfo")).is_err());
    assert_eq!(registry.generation(), 1);
}

#[test]
fn resolvers_keep_answering_during_reloads() {
    let source = Arc::new(MockSource::rotating(10));
    let (registry, loader) = start(source);
    let resolver = Resolver::new(Arc::clone(&registry));

    let (tx, feed) = ChannelFeed::channel(256);
    let handle = UpdateWatcher::new(loader, Arc::clone(&registry), &fast_config())
        .spawn(feed)
        .unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            let resolver = resolver.clone();
            s.spawn(move || {
                for i in 0..5000 {
                    let key = (i % 10).to_string();
                    let entry = resolver.resolve(&key).expect("all keys always routed");
                    assert_eq!(entry.device_id, format!("device:{key}"));
                    assert!(entry.destination_url.starts_with(&format!("url:{key}")));
                }
            });
        }
        for _ in 0..20 {
            let _ = tx.send(ChangeNotification::now("MMSCInfo"));
            thread::sleep(Duration::from_millis(2));
        }
    });

    let stats = handle.shutdown().unwrap();
    assert!(stats.installs >= 1);
    assert_eq!(stats.failures, 0);
}

#[test]
fn shutdown_lets_in_flight_reload_finish() {
    let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded(1);
    let source = Arc::new(GatedSource {
        inner: MockSource::default(),
        armed: AtomicBool::new(false),
        entered: entered_tx,
        release: release_rx,
    });
    let (registry, loader) = start(source.clone());

    let (tx, feed) = ChannelFeed::channel(4);
    let handle = UpdateWatcher::new(loader, Arc::clone(&registry), &fast_config())
        .spawn(feed)
        .unwrap();

    source.armed.store(true, Ordering::Relaxed);
    source.inner.bump();
    tx.send(ChangeNotification::now("MMSCInfo")).unwrap();
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("reload reached the source");

    let stopper = thread::spawn(move || handle.shutdown());
    thread::sleep(Duration::from_millis(50));
    // The watcher is parked in fetch: shutdown waits and readers still see
    // the complete initial table.
    assert!(!stopper.is_finished());
    assert_eq!(registry.generation(), 1);
    assert_eq!(registry.current().len(), 10);

    release_tx.send(()).unwrap();
    let stats = stopper.join().unwrap().unwrap();

    assert_eq!(stats.installs, 1);
    assert_eq!(stats.failures, 0);
    assert_eq!(registry.generation(), 1 + stats.installs);
    let table = registry.current();
    assert_eq!(table.len(), 10);
    for (key, entry) in table.entries() {
        assert_eq!(entry.destination_url, format!("url:{key}1"));
    }
}
