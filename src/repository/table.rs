use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{TableConfig, TableMetadata};
use crate::errors::Result;

/// Trait defining the interface to warehouse-resident tables.
///
/// The reconciliation core never talks to a warehouse directly; every
/// observation and mutation of actual table state goes through this
/// contract. Implementations exist per warehouse (a columnar cloud
/// warehouse, a lakehouse catalog); the core ships none and is tested
/// against the contract alone.
///
/// # Errors
///
/// Methods that look up a table report a missing one as
/// [`crate::TableformError::TableNotFound`]. Handlers treat that variant as
/// a recoverable branch; every other error is terminal for the dispatch.
#[async_trait]
pub trait TableRepository: Send + Sync {
    /// Reads the actual state of a table, including its stored definition
    /// fingerprint and creation/update timestamps.
    async fn get_table_metadata(&self, table_name: &str) -> Result<TableMetadata>;

    /// Returns `Ok(())` if the table is present, `TableNotFound` otherwise.
    async fn table_exists(&self, table_name: &str) -> Result<()>;

    /// Creates a table with the config's schema, partition field, and
    /// expiry. The stored `definition` label must equal
    /// `format_definition(config.definition)`.
    async fn create_table(&self, config: &TableConfig) -> Result<()>;

    /// Full copy, preserving schema, partitioning, and the definition
    /// fingerprint. `expires` overrides the destination's expiry when set.
    async fn copy_table(
        &self,
        source_table_name: &str,
        destination_table_name: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn delete_table(&self, table_name: &str, not_found_ok: bool) -> Result<()>;

    /// Write-truncates one partition with the query's result set.
    ///
    /// A query producing zero rows is a warehouse failure
    /// ([`crate::TableformError::QueryReturnedNoData`]), distinct from the
    /// domain error taxonomy.
    async fn write_query_results_to_table_partition(
        &self,
        table_name: &str,
        query: &str,
        partition: &str,
    ) -> Result<()>;

    /// Write-truncates the entire table with the query's result set.
    async fn write_query_results_to_table(&self, table_name: &str, query: &str) -> Result<()>;

    /// Deterministic fingerprint of a table definition.
    ///
    /// Stable under equal inputs and at most 63 characters, so it can be
    /// stored as a label on the table itself.
    fn format_definition(&self, definition: &str) -> String;
}
