use std::sync::Arc;

use crate::error::RouteError;
use crate::model::RouteTable;
use crate::registry::RouteTableRegistry;
use crate::source::RecordSource;

/// Builds complete route tables from a [`RecordSource`].
#[derive(Clone)]
pub struct TableLoader {
    source: Arc<dyn RecordSource>,
}

impl TableLoader {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch all records and build a fresh, unpublished table.
    pub fn load(&self) -> Result<RouteTable, RouteError> {
        let records = self.source.fetch()?;
        let count = records.len();
        let table = RouteTable::build(records)?;
        log::debug!("loaded {} routes from {}", count, self.source.name());
        Ok(table)
    }

    /// Load and publish into `registry`, returning the generation this call
    /// installed. On error the registry is not touched.
    pub fn load_into(&self, registry: &RouteTableRegistry) -> Result<u64, RouteError> {
        let table = self.load()?;
        Ok(registry.install(table).generation)
    }
}
