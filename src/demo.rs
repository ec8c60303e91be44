//! Reader workload: rounds of parallel lookups against the published table
//! while the watcher keeps swapping in reloaded generations.

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::RouteError;
use crate::loader::TableLoader;
use crate::output;
use crate::registry::RouteTableRegistry;
use crate::resolver::{Resolver, ResolverPool};
use crate::source::RecordSource;
use crate::watcher::{PeriodicFeed, UpdateWatcher, WatcherStats};

/// Shape of the lookup workload.
#[derive(Clone, Debug)]
pub struct DemoPlan {
    pub rounds: u32,
    pub lookups_per_round: usize,
    pub round_delay: Duration,
    /// Watcher polls between simulated change notifications.
    pub change_every: u64,
    pub format: OutputFormat,
}

#[derive(Clone, Debug, Default)]
pub struct DemoSummary {
    pub rounds: u32,
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub generations_seen: BTreeSet<u64>,
    pub final_generation: u64,
    pub watcher: WatcherStats,
}

/// Run the workload to completion or until `stop` is set.
///
/// The initial table must load; any failure there is returned before a
/// single resolver starts. Reload failures later on only show up in the
/// watcher stats.
pub fn run_demo(
    config: &Config,
    plan: &DemoPlan,
    source: Arc<dyn RecordSource>,
    writer: &mut impl Write,
    stop: &AtomicBool,
) -> Result<DemoSummary, RouteError> {
    config.validate()?;

    let loader = TableLoader::new(source);
    let initial = loader.load().inspect_err(|e| {
        log::warn!("initial route table from {} failed: {e}", loader.source_name());
    })?;
    log::info!("initial route table: {} routes", initial.len());
    let registry = RouteTableRegistry::shared(initial);

    let entity_type = config
        .recognized_entity_types
        .first()
        .ok_or_else(|| RouteError::Config("no recognized entity types".to_string()))?;
    let watcher = UpdateWatcher::new(loader, Arc::clone(&registry), config)
        .spawn(PeriodicFeed::new(entity_type, plan.change_every))?;

    let pool = ResolverPool::new(Resolver::new(Arc::clone(&registry)), config.worker_pool_size)?;
    log::info!(
        "resolver pool: {} workers, {} rounds x {} lookups",
        pool.size(),
        plan.rounds,
        plan.lookups_per_round
    );

    output::write_header(plan.format, writer)?;

    let mut summary = DemoSummary::default();
    let mut next_id: u64 = 0;
    for round in 0..plan.rounds {
        if !pause(plan.round_delay, stop) {
            log::info!("stop requested after {round} rounds");
            break;
        }

        for i in 0..plan.lookups_per_round {
            pool.submit(next_id, &i.to_string())?;
            next_id += 1;
        }
        for _ in 0..plan.lookups_per_round {
            let res = pool
                .results()
                .recv()
                .map_err(|_| RouteError::Fatal("resolver workers exited".to_string()))?;
            summary.lookups += 1;
            if res.entry.is_some() {
                summary.hits += 1;
            } else {
                summary.misses += 1;
            }
            summary.generations_seen.insert(res.generation);
            output::write_resolution(&res, plan.format, writer)?;
        }
        summary.rounds += 1;
    }

    pool.shutdown();
    summary.watcher = watcher.shutdown()?;
    summary.final_generation = registry.generation();
    log::info!(
        "demo done: {} lookups ({} hits), generations {:?}",
        summary.lookups,
        summary.hits,
        summary.generations_seen
    );
    Ok(summary)
}

/// Sleep for `delay` in short slices. Returns false if `stop` was raised.
fn pause(delay: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(50)));
    }
}
