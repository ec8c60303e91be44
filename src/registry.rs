use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::{ArcSwap, Guard};

use crate::model::RouteTable;

/// Registry handle shared between the watcher and resolvers.
pub type SharedRegistry = Arc<RouteTableRegistry>;

/// Outcome of [`RouteTableRegistry::install`].
#[derive(Debug)]
pub struct Installed {
    pub generation: u64,
    pub previous: Arc<RouteTable>,
}

/// Holder of the currently published [`RouteTable`].
///
/// Reads go through `ArcSwap` and never block. Writers publish a whole new
/// table with a single pointer swap; the writer mutex only orders concurrent
/// `replace` calls among themselves so generations stay monotonic.
pub struct RouteTableRegistry {
    current: ArcSwap<RouteTable>,
    last_generation: Mutex<u64>,
}

impl RouteTableRegistry {
    /// Create a registry publishing `initial` as generation 1.
    pub fn new(mut initial: RouteTable) -> Self {
        initial.generation = 1;
        Self {
            current: ArcSwap::from_pointee(initial),
            last_generation: Mutex::new(1),
        }
    }

    /// Convenience constructor returning the registry already wrapped for sharing.
    pub fn shared(initial: RouteTable) -> SharedRegistry {
        Arc::new(Self::new(initial))
    }

    /// The active table. The returned `Arc` keeps that generation alive for
    /// as long as the caller holds it, regardless of later replacements.
    pub fn current(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    /// Short-lived borrow of the active table without touching the refcount.
    ///
    /// Intended for single lookups; hold `current()` instead for longer work.
    pub fn load(&self) -> Guard<Arc<RouteTable>> {
        self.current.load()
    }

    /// Publish `table` as the active table and return the generation it replaced.
    pub fn replace(&self, table: RouteTable) -> Arc<RouteTable> {
        self.install(table).previous
    }

    /// Publish `table` and report both the generation it was stamped with and
    /// the table it displaced.
    ///
    /// The stamped generation is fixed under the writer lock, so it stays
    /// accurate even when other writers publish right after this call.
    pub fn install(&self, mut table: RouteTable) -> Installed {
        let mut last = self
            .last_generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *last += 1;
        let generation = *last;
        table.generation = generation;
        let previous = self.current.swap(Arc::new(table));
        log::debug!(
            "published route table generation {generation} (replaced {})",
            previous.generation()
        );
        Installed {
            generation,
            previous,
        }
    }

    /// Generation number of the active table.
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }
}
