//! Public entry points: wire repositories into a bus and drive
//! reconciliations through it.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::bus::MessageBus;
use crate::domain::{Command, Message, TableConfig};
use crate::errors::Result;
use crate::handlers::Handlers;
use crate::repository::{
    InMemoryTableConfigRepository, QueryRepository, TableConfigRepository, TableRepository,
};
use crate::template::QueryRenderer;

/// Wires the default handler set into a message bus.
///
/// When no config repository is given, the in-memory adapter is used; it is
/// the default configuration of the engine.
pub fn bootstrap(
    tables: Arc<dyn TableRepository>,
    queries: Arc<dyn QueryRepository>,
    table_configs: Option<Arc<dyn TableConfigRepository>>,
) -> MessageBus<Handlers> {
    let table_configs =
        table_configs.unwrap_or_else(|| Arc::new(InMemoryTableConfigRepository::new()));
    MessageBus::new(Handlers::new(tables, queries, table_configs))
}

/// Facade over the bus: one method per reconciliation operation.
///
/// Each method builds a root command and dispatches it. A successful
/// reconciliation is silent; recoverable mismatches are repaired
/// internally, and only terminal conditions surface as errors. The
/// in-order message [`log`](Self::log) stays available for post-mortems
/// either way.
pub struct TableManager {
    bus: MessageBus<Handlers>,
}

impl TableManager {
    pub fn new(bus: MessageBus<Handlers>) -> Self {
        Self { bus }
    }

    /// Builds a manager over the given repositories with the default
    /// in-memory config registry.
    pub fn from_repositories(
        tables: Arc<dyn TableRepository>,
        queries: Arc<dyn QueryRepository>,
    ) -> Self {
        Self::new(bootstrap(tables, queries, None))
    }

    /// Drives a partitioned table to its expected state, registering the
    /// query renderer under the table's name first.
    #[instrument(name = "sync_partitioned_table", err, skip_all, fields(table_name = %expected.table_name))]
    pub async fn sync_partitioned_table(
        &mut self,
        expected: TableConfig,
        query_renderer: QueryRenderer,
    ) -> Result<()> {
        info!("synchronizing partitioned table");
        self.bus
            .dispatch(Command::SyncPartitionedTable {
                expected,
                query_renderer,
            })
            .await
    }

    /// Write-truncates an unpartitioned table with a query's results.
    #[instrument(name = "sync_unpartitioned_table", err, skip_all, fields(table_name = %table_name))]
    pub async fn sync_unpartitioned_table(&mut self, table_name: &str, query: &str) -> Result<()> {
        self.bus
            .dispatch(Command::SyncUnpartitionedTable {
                table_name: table_name.to_string(),
                query: query.to_string(),
            })
            .await
    }

    /// Registers a query renderer without reconciling anything.
    #[instrument(name = "add_query", err, skip_all, fields(query_name = %query_name))]
    pub async fn add_query(
        &mut self,
        query_name: &str,
        query_renderer: QueryRenderer,
    ) -> Result<()> {
        self.bus
            .dispatch(Command::AddQuery {
                query_name: query_name.to_string(),
                query_renderer,
            })
            .await
    }

    /// Replaces a table's contents with another table's, by name.
    #[instrument(name = "replace_table", err, skip_all, fields(table_name = %table_name))]
    pub async fn replace_table(
        &mut self,
        table_name: &str,
        replacement_table_name: &str,
    ) -> Result<()> {
        self.bus
            .dispatch(Command::ReplaceTable {
                table_name: table_name.to_string(),
                replacement_table_name: replacement_table_name.to_string(),
            })
            .await
    }

    /// Ordered record of every dispatched message.
    pub fn log(&self) -> &[Message] {
        self.bus.log()
    }
}
