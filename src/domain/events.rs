use crate::domain::values::SchemaField;

/// Facts about completed work. Events are absorbed by the bus unless a
/// handler is registered for them.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TableExists {
        table_name: String,
    },
    TableUpToDate {
        table_name: String,
    },
    TableDeleted {
        table_name: String,
    },
    TableCopied {
        source_table_name: String,
        destination_table_name: String,
    },
    TableCreated {
        table_name: String,
        schema: Vec<SchemaField>,
        partition_field: String,
    },
    TablePartitionUpdated {
        table_name: String,
        query: String,
        partition: String,
    },
    TableDefinitionUpToDate {
        table_name: String,
    },
    TablePartitionFieldUpToDate {
        table_name: String,
    },
    TableSchemaUpToDate {
        table_name: String,
    },
    TablePartitionsExist {
        table_name: String,
    },
    TablePartitionsUpToDate {
        table_name: String,
    },
    NoNewUpstreamDependencies {
        table_name: String,
    },
    QueryAdded {
        query_name: String,
    },
    TableReplaced {
        table_name: String,
    },
    TableSynchronized {
        table_name: String,
    },
}
