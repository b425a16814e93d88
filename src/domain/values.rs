use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single field descriptor in a table schema.
///
/// Field order is significant: two schemas are equal only if they list the
/// same fields in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub mode: String,
}

impl SchemaField {
    pub fn new(
        name: impl Into<String>,
        field_type: impl Into<String>,
        mode: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            mode: mode.into(),
        }
    }
}

/// User-defined expected state of a managed table.
///
/// `partitions` hold ISO-8601 `YYYY-MM-DD` dates and are compared as an
/// ordered sequence. That format is load-bearing: its lexicographic order
/// coincides with chronological order, which partition comparison relies on.
/// An empty `partition_field` marks the table as unpartitioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub table_name: String,
    pub schema: Vec<SchemaField>,
    pub partition_field: String,
    pub partitions: Vec<String>,
    pub definition: String,
    #[serde(default)]
    pub upstream_table_names: Vec<String>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

/// Actual metadata of an existing table, as observed in the warehouse.
///
/// Shares the shape of [`TableConfig`] plus creation and last-update
/// timestamps. `definition` holds the *stored fingerprint* of the defining
/// query, not the query text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table_name: String,
    pub schema: Vec<SchemaField>,
    pub partition_field: String,
    pub partitions: Vec<String>,
    pub definition: String,
    #[serde(default)]
    pub upstream_table_names: Vec<String>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl TableMetadata {
    /// Builds metadata from an expected config, as a repository would after
    /// materializing the table.
    pub fn from_config(config: TableConfig, created: DateTime<Utc>, updated: DateTime<Utc>) -> Self {
        Self {
            table_name: config.table_name,
            schema: config.schema,
            partition_field: config.partition_field,
            partitions: config.partitions,
            definition: config.definition,
            upstream_table_names: config.upstream_table_names,
            expires: config.expires,
            created,
            updated,
        }
    }
}
