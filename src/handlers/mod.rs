//! Command handlers and the error→command trigger map.
//!
//! Each handler is a pure function of a command and the repositories: it
//! answers with an event, a domain error, or an ordered plan of follow-up
//! messages, and never fails on a recoverable mismatch. The trigger map
//! picks the repair for each mismatch: partition-only drift is repaired in
//! place (backfill); structural or lineage drift rebuilds the table into a
//! side-load and swaps it in.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future;
use minijinja::value::Value;
use tracing::info;

use crate::bus::{MessageHandler, Response};
use crate::domain::{Command, DomainError, Event, Message, TableConfig, TableMetadata};
use crate::errors::{Result, TableformError};
use crate::repository::{QueryRepository, TableConfigRepository, TableRepository};
use crate::template::{QueryRenderer, TemplateFields};
use crate::utils;

/// Which command repairs a given mismatch.
///
/// `TableAlreadyExists` has no repair; the single-writer resource model
/// makes it unreachable, and dispatching it is terminal.
pub fn trigger_for(error: &DomainError) -> Option<Command> {
    match error {
        DomainError::TableDoesNotExist { table_name } => Some(Command::CreateTable {
            table_name: table_name.clone(),
        }),
        DomainError::TableHasNoPartitions {
            table_name,
            missing_partitions,
        }
        | DomainError::PartitionsDoNotMatchExpectation {
            table_name,
            missing_partitions,
        } => Some(Command::PlanBackfill {
            table_name: table_name.clone(),
            partitions: missing_partitions.clone(),
        }),
        DomainError::PartitionFieldDoesNotMatchExpectation { table_name }
        | DomainError::SchemaDoesNotMatchExpectation { table_name }
        | DomainError::DefinitionDoesNotMatchExpectation { table_name }
        | DomainError::NewUpstreamDependenciesSinceLastUpdate { table_name }
        | DomainError::ExistingPartitionsExceedExpectations { table_name } => {
            Some(Command::PlanSideload {
                table_name: table_name.clone(),
            })
        }
        DomainError::TableAlreadyExists { .. } => None,
    }
}

/// The default handler set over the three repositories.
pub struct Handlers {
    tables: Arc<dyn TableRepository>,
    queries: Arc<dyn QueryRepository>,
    table_configs: Arc<dyn TableConfigRepository>,
}

impl Handlers {
    pub fn new(
        tables: Arc<dyn TableRepository>,
        queries: Arc<dyn QueryRepository>,
        table_configs: Arc<dyn TableConfigRepository>,
    ) -> Self {
        Self {
            tables,
            queries,
            table_configs,
        }
    }

    /// Metadata lookup with not-found folded into `None`; any other
    /// repository failure stays terminal.
    async fn try_metadata(&self, table_name: &str) -> Result<Option<TableMetadata>> {
        match self.tables.get_table_metadata(table_name).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(TableformError::TableNotFound { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn check_table_state(&self, expected: TableConfig) -> Response {
        self.table_configs.add_table_config(expected.clone());
        // Existence must be settled before any attribute check, and
        // partition emptiness before the partition-set comparison.
        Response::Messages(vec![
            Message::Command(Command::CheckTableExists {
                table_name: expected.table_name.clone(),
            }),
            Message::Command(Command::CheckForNewUpstreamDependencies {
                table_name: expected.table_name.clone(),
                upstream_table_names: expected.upstream_table_names.clone(),
            }),
            Message::Command(Command::CheckTableDefinition {
                table_name: expected.table_name.clone(),
            }),
            Message::Command(Command::CheckTablePartitionField {
                table_name: expected.table_name.clone(),
            }),
            Message::Command(Command::CheckTableSchema {
                table_name: expected.table_name.clone(),
                expected_schema: expected.schema.clone(),
            }),
            Message::Command(Command::CheckTablePartitionsAreNotEmpty {
                table_name: expected.table_name.clone(),
            }),
            Message::Command(Command::CheckTablePartitions {
                table_name: expected.table_name.clone(),
                expected_partitions: expected.partitions.clone(),
            }),
            Message::Event(Event::TableUpToDate {
                table_name: expected.table_name,
            }),
        ])
    }

    async fn check_table_exists(&self, table_name: String) -> Result<Response> {
        match self.tables.table_exists(&table_name).await {
            Ok(()) => Ok(Response::Event(Event::TableExists { table_name })),
            Err(TableformError::TableNotFound { .. }) => {
                Ok(Response::Error(DomainError::TableDoesNotExist { table_name }))
            }
            Err(error) => Err(error),
        }
    }

    async fn check_for_new_upstream_dependencies(
        &self,
        table_name: String,
        upstream_table_names: Vec<String>,
    ) -> Result<Response> {
        let Some(downstream) = self.try_metadata(&table_name).await? else {
            return Ok(Response::Error(DomainError::TableDoesNotExist { table_name }));
        };

        let reads = upstream_table_names
            .iter()
            .map(|name| self.tables.get_table_metadata(name));
        let upstreams = match future::try_join_all(reads).await {
            Ok(upstreams) => upstreams,
            Err(TableformError::TableNotFound { table_name }) => {
                return Ok(Response::Error(DomainError::TableDoesNotExist { table_name }));
            }
            Err(error) => return Err(error),
        };

        if upstreams
            .iter()
            .any(|upstream| upstream.created > downstream.updated)
        {
            return Ok(Response::Error(
                DomainError::NewUpstreamDependenciesSinceLastUpdate { table_name },
            ));
        }
        Ok(Response::Event(Event::NoNewUpstreamDependencies { table_name }))
    }

    async fn check_table_definition(&self, table_name: String) -> Result<Response> {
        let config = self.table_configs.get_table_config(&table_name)?;
        let expected_fingerprint = self.tables.format_definition(&config.definition);
        let Some(metadata) = self.try_metadata(&table_name).await? else {
            return Ok(Response::Error(DomainError::TableDoesNotExist { table_name }));
        };

        if metadata.definition != expected_fingerprint {
            return Ok(Response::Error(
                DomainError::DefinitionDoesNotMatchExpectation { table_name },
            ));
        }
        Ok(Response::Event(Event::TableDefinitionUpToDate { table_name }))
    }

    async fn check_table_partition_field(&self, table_name: String) -> Result<Response> {
        let config = self.table_configs.get_table_config(&table_name)?;
        let Some(metadata) = self.try_metadata(&table_name).await? else {
            return Ok(Response::Error(DomainError::TableDoesNotExist { table_name }));
        };

        if metadata.partition_field != config.partition_field {
            return Ok(Response::Error(
                DomainError::PartitionFieldDoesNotMatchExpectation { table_name },
            ));
        }
        Ok(Response::Event(Event::TablePartitionFieldUpToDate { table_name }))
    }

    async fn check_table_schema(&self, table_name: String) -> Result<Response> {
        let config = self.table_configs.get_table_config(&table_name)?;
        let Some(metadata) = self.try_metadata(&table_name).await? else {
            return Ok(Response::Error(DomainError::TableDoesNotExist { table_name }));
        };

        if metadata.schema != config.schema {
            return Ok(Response::Error(DomainError::SchemaDoesNotMatchExpectation {
                table_name,
            }));
        }
        Ok(Response::Event(Event::TableSchemaUpToDate { table_name }))
    }

    async fn check_table_partitions_are_not_empty(&self, table_name: String) -> Result<Response> {
        let config = self.table_configs.get_table_config(&table_name)?;
        let Some(metadata) = self.try_metadata(&table_name).await? else {
            return Ok(Response::Error(DomainError::TableDoesNotExist { table_name }));
        };

        if metadata.partitions.is_empty() && !config.partitions.is_empty() {
            return Ok(Response::Error(DomainError::TableHasNoPartitions {
                table_name,
                missing_partitions: config.partitions,
            }));
        }
        Ok(Response::Event(Event::TablePartitionsExist { table_name }))
    }

    async fn check_table_partitions(&self, table_name: String) -> Result<Response> {
        let config = self.table_configs.get_table_config(&table_name)?;
        let Some(metadata) = self.try_metadata(&table_name).await? else {
            return Ok(Response::Error(DomainError::TableDoesNotExist { table_name }));
        };

        if !config.partitions.is_empty() {
            let expected_dates = config
                .partitions
                .iter()
                .map(|partition| utils::parse_partition_date(partition))
                .collect::<Result<Vec<_>>>()?;
            if let Some(config_start) = expected_dates.into_iter().min() {
                // Partitions older than the expected window cannot be
                // repaired in place; the drift is structural.
                for partition in &metadata.partitions {
                    if utils::parse_partition_date(partition)? < config_start {
                        return Ok(Response::Error(
                            DomainError::ExistingPartitionsExceedExpectations { table_name },
                        ));
                    }
                }
            }
        }

        if metadata.partitions != config.partitions {
            let missing_partitions = config
                .partitions
                .iter()
                .filter(|partition| !metadata.partitions.contains(partition))
                .cloned()
                .collect();
            return Ok(Response::Error(DomainError::PartitionsDoNotMatchExpectation {
                table_name,
                missing_partitions,
            }));
        }
        Ok(Response::Event(Event::TablePartitionsUpToDate { table_name }))
    }

    async fn create_table(&self, table_name: String) -> Result<Response> {
        match self.try_metadata(&table_name).await? {
            Some(metadata) => Ok(Response::Error(DomainError::TableAlreadyExists { metadata })),
            None => {
                let config = self.table_configs.get_table_config(&table_name)?;
                self.tables.create_table(&config).await?;
                Ok(Response::Event(Event::TableCreated {
                    table_name,
                    schema: config.schema,
                    partition_field: config.partition_field,
                }))
            }
        }
    }

    async fn copy_table(
        &self,
        source_table_name: String,
        destination_table_name: String,
        expires: Option<DateTime<Utc>>,
    ) -> Result<Response> {
        info!(
            source = %source_table_name,
            destination = %destination_table_name,
            "copying table"
        );
        self.tables
            .copy_table(&source_table_name, &destination_table_name, expires)
            .await?;
        Ok(Response::Event(Event::TableCopied {
            source_table_name,
            destination_table_name,
        }))
    }

    async fn delete_table(&self, table_name: String, not_found_ok: bool) -> Result<Response> {
        self.tables.delete_table(&table_name, not_found_ok).await?;
        Ok(Response::Event(Event::TableDeleted { table_name }))
    }

    async fn update_table_partition(
        &self,
        table_name: String,
        query: String,
        partition: String,
    ) -> Result<Response> {
        self.tables
            .write_query_results_to_table_partition(&table_name, &query, &partition)
            .await?;
        Ok(Response::Event(Event::TablePartitionUpdated {
            table_name,
            query,
            partition,
        }))
    }

    /// One `UpdateTablePartition` per missing partition, in the supplied
    /// order. The run-time `table_name` field points each query at its
    /// actual target, overriding any same-named construction-time field —
    /// a side-load table's query renders under the side-load name.
    fn plan_backfill(&self, table_name: String, partitions: Vec<String>) -> Result<Response> {
        let mut plan = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let mut run_time_fields = TemplateFields::new();
            run_time_fields.insert("table_name".to_string(), Value::from(table_name.as_str()));
            let query = self
                .queries
                .get_query(&table_name, &partition, Some(run_time_fields))?;
            plan.push(Message::Command(Command::UpdateTablePartition {
                table_name: table_name.clone(),
                query,
                partition,
            }));
        }
        Ok(Response::Messages(plan))
    }

    /// The side-load plan: reconcile a replacement table under a
    /// fingerprinted name, snapshot the original as `{name}_backup`, swap
    /// the replacement in, and drop it. The backup is retained.
    fn plan_sideload(&self, table_name: String) -> Result<Response> {
        let config = self.table_configs.get_table_config(&table_name)?;
        let sideload_table_name = format!(
            "{}_sideload_{}",
            table_name,
            self.queries.get_query_hash(&config.table_name)?
        );
        let backup_table_name = format!("{table_name}_backup");

        self.queries.copy_query(&table_name, &sideload_table_name)?;
        let expected = TableConfig {
            table_name: sideload_table_name.clone(),
            schema: config.schema,
            partition_field: config.partition_field,
            partitions: config.partitions,
            definition: config.definition,
            upstream_table_names: Vec::new(),
            expires: None,
        };

        Ok(Response::Messages(vec![
            Message::Command(Command::CheckTableState { expected }),
            Message::Command(Command::DeleteTable {
                table_name: backup_table_name.clone(),
                not_found_ok: true,
            }),
            Message::Command(Command::CopyTable {
                source_table_name: table_name.clone(),
                destination_table_name: backup_table_name,
                expires: None,
            }),
            Message::Command(Command::ReplaceTable {
                table_name,
                replacement_table_name: sideload_table_name.clone(),
            }),
            Message::Command(Command::DeleteTable {
                table_name: sideload_table_name,
                not_found_ok: false,
            }),
        ]))
    }

    fn replace_table(&self, table_name: String, replacement_table_name: String) -> Response {
        Response::Messages(vec![
            Message::Command(Command::DeleteTable {
                table_name: table_name.clone(),
                not_found_ok: false,
            }),
            Message::Command(Command::CopyTable {
                source_table_name: replacement_table_name,
                destination_table_name: table_name.clone(),
                expires: None,
            }),
            Message::Event(Event::TableReplaced { table_name }),
        ])
    }

    fn add_query(&self, query_name: String, query_renderer: QueryRenderer) -> Response {
        self.queries.add_query(&query_name, query_renderer);
        Response::Event(Event::QueryAdded { query_name })
    }

    fn sync_partitioned_table(
        &self,
        expected: TableConfig,
        query_renderer: QueryRenderer,
    ) -> Response {
        Response::Messages(vec![
            Message::Command(Command::AddQuery {
                query_name: expected.table_name.clone(),
                query_renderer,
            }),
            Message::Command(Command::CheckTableState {
                expected: expected.clone(),
            }),
            Message::Event(Event::TableSynchronized {
                table_name: expected.table_name,
            }),
        ])
    }

    async fn sync_unpartitioned_table(&self, table_name: String, query: String) -> Result<Response> {
        self.tables
            .write_query_results_to_table(&table_name, &query)
            .await?;
        Ok(Response::Event(Event::TableSynchronized { table_name }))
    }
}

#[async_trait]
impl MessageHandler for Handlers {
    async fn handle_command(&self, command: Command) -> Result<Response> {
        match command {
            Command::CheckTableState { expected } => Ok(self.check_table_state(expected)),
            Command::CheckTableExists { table_name } => self.check_table_exists(table_name).await,
            Command::CheckForNewUpstreamDependencies {
                table_name,
                upstream_table_names,
            } => {
                self.check_for_new_upstream_dependencies(table_name, upstream_table_names)
                    .await
            }
            Command::CheckTableDefinition { table_name } => {
                self.check_table_definition(table_name).await
            }
            Command::CheckTablePartitionField { table_name } => {
                self.check_table_partition_field(table_name).await
            }
            // Expected state is read back from the config registry, not the
            // command payload, so retried checks observe re-registered
            // configs.
            Command::CheckTableSchema {
                table_name,
                expected_schema: _,
            } => self.check_table_schema(table_name).await,
            Command::CheckTablePartitionsAreNotEmpty { table_name } => {
                self.check_table_partitions_are_not_empty(table_name).await
            }
            Command::CheckTablePartitions {
                table_name,
                expected_partitions: _,
            } => self.check_table_partitions(table_name).await,
            Command::UpdateTablePartition {
                table_name,
                query,
                partition,
            } => self.update_table_partition(table_name, query, partition).await,
            Command::CreateTable { table_name } => self.create_table(table_name).await,
            Command::CopyTable {
                source_table_name,
                destination_table_name,
                expires,
            } => {
                self.copy_table(source_table_name, destination_table_name, expires)
                    .await
            }
            Command::DeleteTable {
                table_name,
                not_found_ok,
            } => self.delete_table(table_name, not_found_ok).await,
            Command::PlanBackfill {
                table_name,
                partitions,
            } => self.plan_backfill(table_name, partitions),
            Command::PlanSideload { table_name } => self.plan_sideload(table_name),
            Command::AddQuery {
                query_name,
                query_renderer,
            } => Ok(self.add_query(query_name, query_renderer)),
            Command::ReplaceTable {
                table_name,
                replacement_table_name,
            } => Ok(self.replace_table(table_name, replacement_table_name)),
            Command::SyncPartitionedTable {
                expected,
                query_renderer,
            } => Ok(self.sync_partitioned_table(expected, query_renderer)),
            Command::SyncUnpartitionedTable { table_name, query } => {
                self.sync_unpartitioned_table(table_name, query).await
            }
        }
    }

    fn compensation(&self, error: &DomainError) -> Option<Command> {
        trigger_for(error)
    }
}
