use std::thread;

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::error::RouteError;
use crate::model::RouteEntry;
use crate::registry::SharedRegistry;

/// Reader-side handle. Cheap to clone; every clone reads the same registry.
#[derive(Clone)]
pub struct Resolver {
    registry: SharedRegistry,
}

/// Answer to one lookup, tagged with the table generation that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub id: u64,
    pub key: String,
    pub entry: Option<RouteEntry>,
    pub generation: u64,
}

impl Resolver {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Resolve `key` against the table that is current at call time.
    ///
    /// `None` means the key is not routed in that generation.
    pub fn resolve(&self, key: &str) -> Option<RouteEntry> {
        self.registry.load().lookup(key).cloned()
    }

    /// Run `f` on the borrowed entry without cloning it out of the table.
    pub fn resolve_with<R>(&self, key: &str, f: impl FnOnce(Option<&RouteEntry>) -> R) -> R {
        let table = self.registry.load();
        f(table.lookup(key))
    }

    /// Like [`resolve`](Self::resolve), also reporting the generation consulted.
    pub fn resolve_tagged(&self, id: u64, key: &str) -> Resolution {
        let table = self.registry.load();
        Resolution {
            id,
            key: key.to_string(),
            entry: table.lookup(key).cloned(),
            generation: table.generation(),
        }
    }
}

/// Queued lookup for a [`ResolverPool`].
#[derive(Clone, Debug)]
pub struct LookupRequest {
    pub id: u64,
    pub key: String,
}

/// Fixed set of worker threads answering lookups concurrently.
///
/// Requests go through a bounded queue; answers come back on an unbounded
/// channel so workers never stall on a caller that drains late.
pub struct ResolverPool {
    request_tx: Option<Sender<LookupRequest>>,
    result_rx: Receiver<Resolution>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ResolverPool {
    /// Spawn `size` workers sharing `resolver`.
    pub fn new(resolver: Resolver, size: usize) -> Result<Self, RouteError> {
        if size == 0 {
            return Err(RouteError::Config(
                "resolver pool needs at least one worker".to_string(),
            ));
        }
        let (request_tx, request_rx) = crossbeam_channel::bounded::<LookupRequest>(size * 4);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<Resolution>();

        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let rx = request_rx.clone();
            let tx = result_tx.clone();
            let resolver = resolver.clone();
            let h = thread::Builder::new()
                .name(format!("routeswap-resolver-{i}"))
                .spawn(move || {
                    resolver_worker(&resolver, rx, tx);
                })
                .map_err(|e| RouteError::Fatal(format!("spawn resolver worker: {e}")))?;
            workers.push(h);
        }

        Ok(Self {
            request_tx: Some(request_tx),
            result_rx,
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a lookup. Blocks while the request queue is full.
    pub fn submit(&self, id: u64, key: &str) -> Result<(), RouteError> {
        let tx = self
            .request_tx
            .as_ref()
            .ok_or_else(|| RouteError::Fatal("resolver pool is shut down".to_string()))?;
        tx.send(LookupRequest {
            id,
            key: key.to_string(),
        })
        .map_err(|_| RouteError::Fatal("all resolver workers exited".to_string()))
    }

    /// Completed lookups, in completion order.
    pub fn results(&self) -> &Receiver<Resolution> {
        &self.result_rx
    }

    /// Close the request queue, wait for workers to finish outstanding
    /// requests, and return every answer not yet received.
    pub fn shutdown(mut self) -> Vec<Resolution> {
        drop(self.request_tx.take());
        for h in self.workers.drain(..) {
            if h.join().is_err() {
                log::warn!("resolver worker panicked");
            }
        }
        self.result_rx.try_iter().collect()
    }
}

/// Worker thread: answers requests until the request channel closes.
fn resolver_worker(resolver: &Resolver, rx: Receiver<LookupRequest>, tx: Sender<Resolution>) {
    while let Ok(req) = rx.recv() {
        if tx.send(resolver.resolve_tagged(req.id, &req.key)).is_err() {
            return; // pool dropped
        }
    }
}
