#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tableform::domain::{SchemaField, TableConfig, TableMetadata};
use tableform::errors::{Result, TableformError};
use tableform::repository::TableRepository;

/// In-memory stand-in for a warehouse, implementing the table repository
/// contract. Definitions are fingerprinted with the identity function so
/// assertions can compare them to config values directly.
#[derive(Default)]
pub struct MockTableRepository {
    tables: Mutex<HashMap<String, TableMetadata>>,
    copy_calls: Mutex<Vec<(String, String)>>,
    partition_writes: Mutex<Vec<String>>,
    table_writes: Mutex<Vec<String>>,
}

impl MockTableRepository {
    pub fn new(tables: impl IntoIterator<Item = TableMetadata>) -> Arc<Self> {
        let tables = tables
            .into_iter()
            .map(|metadata| (metadata.table_name.clone(), metadata))
            .collect();
        Arc::new(Self {
            tables: Mutex::new(tables),
            ..Self::default()
        })
    }

    pub fn metadata(&self, table_name: &str) -> Option<TableMetadata> {
        self.tables.lock().unwrap().get(table_name).cloned()
    }

    /// `(source, destination)` pairs, in call order.
    pub fn copy_calls(&self) -> Vec<(String, String)> {
        self.copy_calls.lock().unwrap().clone()
    }

    /// Partitions written via partition writes, in call order.
    pub fn partition_writes(&self) -> Vec<String> {
        self.partition_writes.lock().unwrap().clone()
    }

    /// Tables written via whole-table writes, in call order.
    pub fn table_writes(&self) -> Vec<String> {
        self.table_writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableRepository for MockTableRepository {
    async fn get_table_metadata(&self, table_name: &str) -> Result<TableMetadata> {
        self.metadata(table_name)
            .ok_or_else(|| TableformError::TableNotFound {
                table_name: table_name.to_string(),
            })
    }

    async fn table_exists(&self, table_name: &str) -> Result<()> {
        self.get_table_metadata(table_name).await.map(|_| ())
    }

    async fn create_table(&self, config: &TableConfig) -> Result<()> {
        // A freshly created table holds no data, hence no partitions.
        let now = Utc::now();
        let metadata = TableMetadata {
            table_name: config.table_name.clone(),
            schema: config.schema.clone(),
            partition_field: config.partition_field.clone(),
            partitions: Vec::new(),
            definition: self.format_definition(&config.definition),
            upstream_table_names: config.upstream_table_names.clone(),
            expires: config.expires,
            created: now,
            updated: now,
        };
        self.tables
            .lock()
            .unwrap()
            .insert(config.table_name.clone(), metadata);
        Ok(())
    }

    async fn copy_table(
        &self,
        source_table_name: &str,
        destination_table_name: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut copied = self.get_table_metadata(source_table_name).await?;
        copied.table_name = destination_table_name.to_string();
        if expires.is_some() {
            copied.expires = expires;
        }
        self.tables
            .lock()
            .unwrap()
            .insert(destination_table_name.to_string(), copied);
        self.copy_calls.lock().unwrap().push((
            source_table_name.to_string(),
            destination_table_name.to_string(),
        ));
        Ok(())
    }

    async fn delete_table(&self, table_name: &str, not_found_ok: bool) -> Result<()> {
        let removed = self.tables.lock().unwrap().remove(table_name);
        if removed.is_none() && !not_found_ok {
            return Err(TableformError::TableNotFound {
                table_name: table_name.to_string(),
            });
        }
        Ok(())
    }

    async fn write_query_results_to_table_partition(
        &self,
        table_name: &str,
        _query: &str,
        partition: &str,
    ) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let metadata = tables
            .get_mut(table_name)
            .ok_or_else(|| TableformError::TableNotFound {
                table_name: table_name.to_string(),
            })?;
        metadata.partitions.push(partition.to_string());
        self.partition_writes.lock().unwrap().push(partition.to_string());
        Ok(())
    }

    async fn write_query_results_to_table(&self, table_name: &str, _query: &str) -> Result<()> {
        self.table_writes.lock().unwrap().push(table_name.to_string());
        Ok(())
    }

    fn format_definition(&self, definition: &str) -> String {
        definition.to_string()
    }
}

pub fn stub_schema() -> Vec<SchemaField> {
    vec![
        SchemaField::new("user_id", "STRING", "REQUIRED"),
        SchemaField::new("day", "DATE", "REQUIRED"),
    ]
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub fn date(value: &str) -> DateTime<Utc> {
    format!("{value}T00:00:00Z").parse().expect("valid RFC 3339 date")
}

pub fn table_config(table_name: &str) -> TableConfig {
    TableConfig {
        table_name: table_name.to_string(),
        schema: stub_schema(),
        partition_field: "day".to_string(),
        partitions: Vec::new(),
        definition: String::new(),
        upstream_table_names: Vec::new(),
        expires: None,
    }
}

pub fn table_metadata(table_name: &str) -> TableMetadata {
    TableMetadata::from_config(table_config(table_name), date("2024-01-01"), date("2024-01-01"))
}
