//! Routing table with lock-free reads and whole-table reloads.
//!
//! A [`RouteTable`](model::RouteTable) is built once and never mutated. The
//! [`RouteTableRegistry`](registry::RouteTableRegistry) publishes the active
//! table through an `ArcSwap`; resolvers read it without locking while an
//! [`UpdateWatcher`](watcher::UpdateWatcher) swaps in freshly loaded
//! generations when the source data changes.

pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod loader;
pub mod model;
pub mod output;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod watcher;
