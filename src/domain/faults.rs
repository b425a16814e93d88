use thiserror::Error;

use crate::domain::values::TableMetadata;

/// Recoverable mismatches between a table's actual and expected state.
///
/// Unlike [`crate::TableformError`], these are first-class messages: the bus
/// routes each through the error-trigger map to produce a compensating
/// command and then re-examines the message that surfaced the mismatch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("table does not exist: {table_name}")]
    TableDoesNotExist { table_name: String },

    #[error("table already exists: {}", .metadata.table_name)]
    TableAlreadyExists { metadata: TableMetadata },

    #[error("table has no partitions: {table_name}")]
    TableHasNoPartitions {
        table_name: String,
        missing_partitions: Vec<String>,
    },

    #[error("partition field does not match expectation for table: {table_name}")]
    PartitionFieldDoesNotMatchExpectation { table_name: String },

    #[error("schema does not match expectation for table: {table_name}")]
    SchemaDoesNotMatchExpectation { table_name: String },

    #[error("definition does not match expectation for table: {table_name}")]
    DefinitionDoesNotMatchExpectation { table_name: String },

    #[error("partitions do not match expectation for table: {table_name}")]
    PartitionsDoNotMatchExpectation {
        table_name: String,
        missing_partitions: Vec<String>,
    },

    #[error("existing partitions exceed expectations for table: {table_name}")]
    ExistingPartitionsExceedExpectations { table_name: String },

    #[error("new upstream dependencies since last update of table: {table_name}")]
    NewUpstreamDependenciesSinceLastUpdate { table_name: String },
}

impl DomainError {
    /// The table this mismatch was observed on.
    pub fn table_name(&self) -> &str {
        match self {
            Self::TableDoesNotExist { table_name }
            | Self::TableHasNoPartitions { table_name, .. }
            | Self::PartitionFieldDoesNotMatchExpectation { table_name }
            | Self::SchemaDoesNotMatchExpectation { table_name }
            | Self::DefinitionDoesNotMatchExpectation { table_name }
            | Self::PartitionsDoNotMatchExpectation { table_name, .. }
            | Self::ExistingPartitionsExceedExpectations { table_name }
            | Self::NewUpstreamDependenciesSinceLastUpdate { table_name } => table_name,
            Self::TableAlreadyExists { metadata } => &metadata.table_name,
        }
    }
}
