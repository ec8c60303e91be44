pub mod feed;

use std::collections::BTreeSet;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError, select};

use crate::config::Config;
use crate::error::RouteError;
use crate::loader::TableLoader;
use crate::registry::SharedRegistry;

pub use feed::{ChangeFeed, ChangeNotification, ChannelFeed, PeriodicFeed};

/// Phase of the reload cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    ChangeDetected,
    Loading,
    Installing,
}

/// Counters accumulated over the watcher's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatcherStats {
    pub ticks: u64,
    pub changes_detected: u64,
    pub ignored: u64,
    pub installs: u64,
    pub failures: u64,
}

/// Result of handling one batch of notifications.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Nothing arrived.
    Quiet,
    /// Only unrecognized entity types arrived.
    Ignored(usize),
    /// A new table was published with this generation.
    Installed(u64),
    /// Loading failed; the previous table stays active.
    Failed(RouteError),
}

/// Background reloader: turns recognized change notifications into a freshly
/// loaded table published through the registry.
pub struct UpdateWatcher {
    loader: TableLoader,
    registry: SharedRegistry,
    config: Config,
    state: WatcherState,
    stats: WatcherStats,
}

impl UpdateWatcher {
    pub fn new(loader: TableLoader, registry: SharedRegistry, config: &Config) -> Self {
        Self {
            loader,
            registry,
            config: config.clone(),
            state: WatcherState::Idle,
            stats: WatcherStats::default(),
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn stats(&self) -> &WatcherStats {
        &self.stats
    }

    fn transition(&mut self, next: WatcherState) {
        log::debug!("watcher: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run one reload cycle for a batch of notifications.
    ///
    /// Any number of recognized notifications in the same batch collapse into
    /// a single reload. A failed load is reported and not retried until the
    /// next recognized change.
    pub fn process_batch(&mut self, batch: &[ChangeNotification]) -> CycleOutcome {
        if batch.is_empty() {
            return CycleOutcome::Quiet;
        }

        let (recognized, ignored): (Vec<_>, Vec<_>) = batch
            .iter()
            .partition(|n| self.config.recognizes(&n.entity_type));
        for n in &ignored {
            log::debug!("ignoring change notification for '{}'", n.entity_type);
        }
        self.stats.ignored += ignored.len() as u64;
        if recognized.is_empty() {
            return CycleOutcome::Ignored(ignored.len());
        }

        self.stats.changes_detected += 1;
        self.transition(WatcherState::ChangeDetected);
        log::info!(
            "change detected for {:?}, reloading from {}",
            recognized
                .iter()
                .map(|n| n.entity_type.as_str())
                .collect::<BTreeSet<_>>(),
            self.loader.source_name()
        );

        self.transition(WatcherState::Loading);
        let table = match self.loader.load() {
            Ok(table) => table,
            Err(e) => {
                self.stats.failures += 1;
                log::warn!(
                    "route table reload failed, keeping generation {}: {e}",
                    self.registry.generation()
                );
                self.transition(WatcherState::Idle);
                return CycleOutcome::Failed(e);
            }
        };

        self.transition(WatcherState::Installing);
        let routes = table.len();
        let installed = self.registry.install(table);
        let generation = installed.generation;
        self.stats.installs += 1;
        log::info!(
            "installed route table generation {generation} ({routes} routes, replaced {})",
            installed.previous.generation()
        );

        self.transition(WatcherState::Idle);
        CycleOutcome::Installed(generation)
    }

    /// Start the poll loop on a dedicated thread.
    pub fn spawn<F>(self, feed: F) -> Result<WatcherHandle, RouteError>
    where
        F: ChangeFeed + 'static,
    {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("routeswap-watcher".into())
            .spawn(move || self.run(feed, shutdown_rx))
            .map_err(|e| RouteError::Fatal(format!("spawn watcher thread: {e}")))?;

        Ok(WatcherHandle {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    fn run<F: ChangeFeed>(mut self, mut feed: F, shutdown_rx: Receiver<()>) -> WatcherStats {
        let poll_interval = self.config.poll_interval();
        let ticker = crossbeam_channel::tick(poll_interval);
        log::info!(
            "watcher started: poll every {:?}, entity types {:?}",
            poll_interval,
            self.config.recognized_entity_types
        );

        loop {
            select! {
                recv(shutdown_rx) -> _ => break,
                recv(ticker) -> _ => {
                    // Both channels may be ready at once; shutdown wins.
                    if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                        break;
                    }
                    self.stats.ticks += 1;
                    let batch = feed.poll();
                    self.process_batch(&batch);
                }
            }
        }

        log::info!("watcher stopped: {:?}", self.stats);
        self.stats
    }
}

/// Owner of a running watcher thread. Dropping it stops the watcher.
pub struct WatcherHandle {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<WatcherStats>>,
}

impl WatcherHandle {
    /// Stop accepting new cycles, let an in-flight cycle finish, and join.
    pub fn shutdown(mut self) -> Result<WatcherStats, RouteError> {
        self.stop()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    fn stop(&mut self) -> Result<WatcherStats, RouteError> {
        drop(self.shutdown_tx.take());
        match self.handle.take() {
            Some(h) => h
                .join()
                .map_err(|_| RouteError::Fatal("watcher thread panicked".to_string())),
            None => Ok(WatcherStats::default()),
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
