use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RouteError;
use crate::model::RouteRecord;

/// External system that supplies raw routing records.
pub trait RecordSource: Send + Sync {
    /// Short label used in log lines.
    fn name(&self) -> &str;

    /// Fetch the full current record set.
    fn fetch(&self) -> Result<Vec<RouteRecord>, RouteError>;
}

/// Generated records: key `i` -> `device:i`, `url:i{rev}`, size `i`.
///
/// `rev` is the revision modulo 10 and starts at 0, so fetches are
/// repeatable until [`MockSource::bump`] is called. A rotating source bumps
/// itself after every fetch, so each reload sees fresh data.
pub struct MockSource {
    count: usize,
    revision: AtomicU64,
    rotating: bool,
}

impl MockSource {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            revision: AtomicU64::new(0),
            rotating: false,
        }
    }

    pub fn rotating(count: usize) -> Self {
        Self {
            rotating: true,
            ..Self::new(count)
        }
    }

    /// Advance to the next revision, simulating an upstream data change.
    pub fn bump(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Relaxed)
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new(10)
    }
}

impl RecordSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(&self) -> Result<Vec<RouteRecord>, RouteError> {
        let revision = if self.rotating {
            self.revision.fetch_add(1, Ordering::Relaxed)
        } else {
            self.revision()
        };
        let digit = revision % 10;
        Ok((0..self.count)
            .map(|i| RouteRecord {
                key: i.to_string(),
                device_id: format!("device:{i}"),
                destination_url: format!("url:{i}{digit}"),
                max_payload_bytes: i as i64,
            })
            .collect())
    }
}

/// JSON file holding an array of [`RouteRecord`]s, re-read on every fetch.
pub struct FileSource {
    path: PathBuf,
    label: String,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let label = format!("file:{}", path.display());
        Self { path, label }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for FileSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch(&self) -> Result<Vec<RouteRecord>, RouteError> {
        let data = std::fs::read_to_string(&self.path)
            .map_err(|e| RouteError::Load(format!("read {}: {e}", self.path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| RouteError::Load(format!("parse {}: {e}", self.path.display())))
    }
}

/// Source that is always unreachable.
pub struct FailingSource {
    reason: String,
}

impl FailingSource {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl RecordSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    fn fetch(&self) -> Result<Vec<RouteRecord>, RouteError> {
        Err(RouteError::Load(self.reason.clone()))
    }
}
