use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::RouteError;

/// Destination a routing key resolves to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub device_id: String,
    pub destination_url: String,
    pub max_payload_bytes: u64,
}

/// Raw record as delivered by a [`RecordSource`](crate::source::RecordSource).
///
/// `max_payload_bytes` is signed so that malformed source data survives
/// deserialization and is rejected by [`RouteTable::build`] instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub key: String,
    pub device_id: String,
    pub destination_url: String,
    pub max_payload_bytes: i64,
}

impl RouteRecord {
    pub fn new(key: &str, device_id: &str, destination_url: &str, max_payload_bytes: i64) -> Self {
        Self {
            key: key.to_string(),
            device_id: device_id.to_string(),
            destination_url: destination_url.to_string(),
            max_payload_bytes,
        }
    }
}

/// One generation of routing state: routing key -> entry.
///
/// Fully populated by `build` and never mutated afterwards, so a shared
/// `Arc<RouteTable>` can be read from any number of threads without locking.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: FxHashMap<String, RouteEntry>,
    /// Install sequence number; 0 until a registry publishes the table.
    pub(crate) generation: u64,
}

impl RouteTable {
    /// Build a table from source records.
    ///
    /// Rejects the whole batch on the first negative payload size, empty key,
    /// or duplicate key. No table is produced in that case.
    pub fn build<I>(records: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = RouteRecord>,
    {
        let records = records.into_iter();
        let mut routes = FxHashMap::default();
        routes.reserve(records.size_hint().0);

        for record in records {
            if record.key.is_empty() {
                return Err(RouteError::invalid(&record.key, "empty routing key"));
            }
            let max_payload_bytes = u64::try_from(record.max_payload_bytes).map_err(|_| {
                RouteError::invalid(
                    &record.key,
                    format!("negative max_payload_bytes {}", record.max_payload_bytes),
                )
            })?;
            if routes.contains_key(&record.key) {
                return Err(RouteError::invalid(&record.key, "duplicate routing key"));
            }
            routes.insert(
                record.key,
                RouteEntry {
                    device_id: record.device_id,
                    destination_url: record.destination_url,
                    max_payload_bytes,
                },
            );
        }

        Ok(Self {
            routes,
            generation: 0,
        })
    }

    pub fn lookup(&self, key: &str) -> Option<&RouteEntry> {
        self.routes.get(key)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RouteEntry)> {
        self.routes.iter().map(|(k, v)| (k.as_str(), v))
    }
}
