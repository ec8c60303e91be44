use std::time::SystemTime;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// A data-change notice for one entity type (e.g. a database table).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeNotification {
    pub entity_type: String,
    pub timestamp: SystemTime,
}

impl ChangeNotification {
    pub fn now(entity_type: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            timestamp: SystemTime::now(),
        }
    }
}

/// Where the watcher gets change notifications from. Polled once per tick.
pub trait ChangeFeed: Send {
    /// Return every notification that arrived since the previous poll. Must not block.
    fn poll(&mut self) -> Vec<ChangeNotification>;
}

/// Push-style feed: producers send into a bounded channel, the watcher drains it.
pub struct ChannelFeed {
    rx: Receiver<ChangeNotification>,
}

impl ChannelFeed {
    pub fn new(rx: Receiver<ChangeNotification>) -> Self {
        Self { rx }
    }

    /// Create a feed plus the sender half producers publish on.
    pub fn channel(capacity: usize) -> (Sender<ChangeNotification>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (tx, Self::new(rx))
    }
}

impl ChangeFeed for ChannelFeed {
    fn poll(&mut self) -> Vec<ChangeNotification> {
        let mut batch = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(notification) => batch.push(notification),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        batch
    }
}

/// Reports a change for `entity_type` on every `every`-th poll.
///
/// Stands in for an operations-center link that announces table edits on a
/// fixed cadence.
pub struct PeriodicFeed {
    entity_type: String,
    every: u64,
    polls: u64,
}

impl PeriodicFeed {
    pub fn new(entity_type: &str, every: u64) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            every: every.max(1),
            polls: 0,
        }
    }
}

impl ChangeFeed for PeriodicFeed {
    fn poll(&mut self) -> Vec<ChangeNotification> {
        self.polls += 1;
        if self.polls % self.every == 0 {
            vec![ChangeNotification::now(&self.entity_type)]
        } else {
            Vec::new()
        }
    }
}
