use thiserror::Error;

/// Main error type for tableform operations.
///
/// Recoverable table-state mismatches are *not* represented here; those are
/// domain messages (see [`crate::domain::DomainError`]) that the message bus
/// compensates internally. This enum covers the terminal conditions a caller
/// can observe.
#[derive(Error, Debug)]
pub enum TableformError {
    #[error("table does not exist: {table_name}")]
    TableNotFound { table_name: String },

    #[error("no table config registered for table: {table_name}")]
    ConfigNotFound { table_name: String },

    #[error("no query registered under name: {query_name}")]
    QueryNotFound { query_name: String },

    #[error("no template registered under name: {name}")]
    TemplateNotFound { name: String },

    #[error("provided template fields may not contain a runtime field, found: {fields:?}")]
    ReservedTemplateFields { fields: Vec<String> },

    #[error("template is missing the following required fields: {fields:?}")]
    MissingTemplateFields { fields: Vec<String> },

    #[error("invalid partition date: {value}")]
    InvalidPartitionDate { value: String },

    #[error("query for table {table_name} returned no data for partition {partition}")]
    QueryReturnedNoData {
        table_name: String,
        partition: String,
    },

    #[error("maximum number of retries reached while reconciling table {table_name}: {condition}")]
    MaxRetriesReached {
        table_name: String,
        condition: String,
    },

    #[error("no compensating command registered for: {condition}")]
    UnhandledDomainError { condition: String },

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("Template error: {0}")]
    Minijinja(#[from] minijinja::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

/// Convenience Result type that uses TableformError
pub type Result<T> = std::result::Result<T, TableformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TableformError::TableNotFound {
            table_name: "events".to_string(),
        };
        assert_eq!(err.to_string(), "table does not exist: events");
    }

    #[test]
    fn test_max_retries_error_names_table_and_condition() {
        let err = TableformError::MaxRetriesReached {
            table_name: "events".to_string(),
            condition: "schema drift".to_string(),
        };
        assert!(err.to_string().contains("events"));
        assert!(err.to_string().contains("schema drift"));
    }
}
