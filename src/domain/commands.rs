use chrono::{DateTime, Utc};

use crate::domain::values::{SchemaField, TableConfig};
use crate::template::QueryRenderer;

/// Imperative messages: each variant has exactly one handler.
///
/// The `Check*` family compares one attribute of a table's actual state
/// against its registered config and answers with an event (in sync) or a
/// domain error (drifted). The remaining variants mutate warehouse state or
/// compose repair plans.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CheckTableState {
        expected: TableConfig,
    },
    CheckTableExists {
        table_name: String,
    },
    CheckForNewUpstreamDependencies {
        table_name: String,
        upstream_table_names: Vec<String>,
    },
    CheckTableDefinition {
        table_name: String,
    },
    CheckTablePartitionField {
        table_name: String,
    },
    CheckTableSchema {
        table_name: String,
        expected_schema: Vec<SchemaField>,
    },
    CheckTablePartitionsAreNotEmpty {
        table_name: String,
    },
    CheckTablePartitions {
        table_name: String,
        expected_partitions: Vec<String>,
    },
    UpdateTablePartition {
        table_name: String,
        query: String,
        partition: String,
    },
    CreateTable {
        table_name: String,
    },
    CopyTable {
        source_table_name: String,
        destination_table_name: String,
        expires: Option<DateTime<Utc>>,
    },
    DeleteTable {
        table_name: String,
        not_found_ok: bool,
    },
    PlanBackfill {
        table_name: String,
        partitions: Vec<String>,
    },
    PlanSideload {
        table_name: String,
    },
    AddQuery {
        query_name: String,
        query_renderer: QueryRenderer,
    },
    ReplaceTable {
        table_name: String,
        replacement_table_name: String,
    },
    SyncPartitionedTable {
        expected: TableConfig,
        query_renderer: QueryRenderer,
    },
    SyncUnpartitionedTable {
        table_name: String,
        query: String,
    },
}
