mod common;

use std::sync::Arc;

use minijinja::value::Value;

use common::{date, strings, stub_schema, table_config, table_metadata, MockTableRepository};
use tableform::bus::{MessageBus, Response};
use tableform::domain::{Command, DomainError, Event, Message, TableMetadata};
use tableform::engine::bootstrap;
use tableform::handlers::{trigger_for, Handlers};
use tableform::repository::{
    InMemoryQueryRepository, InMemoryTableConfigRepository, QueryRepository, TableConfigRepository,
};
use tableform::template::{QueryRenderer, QueryTemplate, TemplateFields};

struct Setup {
    bus: MessageBus<Handlers>,
    tables: Arc<MockTableRepository>,
    queries: Arc<InMemoryQueryRepository>,
    table_configs: Arc<InMemoryTableConfigRepository>,
}

fn setup(tables: Vec<TableMetadata>) -> Setup {
    let tables = MockTableRepository::new(tables);
    let queries = Arc::new(InMemoryQueryRepository::new());
    let table_configs = Arc::new(InMemoryTableConfigRepository::new());
    let bus = bootstrap(
        tables.clone(),
        queries.clone(),
        Some(table_configs.clone()),
    );
    Setup {
        bus,
        tables,
        queries,
        table_configs,
    }
}

fn static_query(query: &str) -> QueryRenderer {
    let query = query.to_string();
    QueryRenderer::new(move |_, _| Ok(query.clone()))
}

#[tokio::test]
async fn test_check_table_exists_reports_missing_table() {
    let Setup { bus, .. } = setup(Vec::new());

    let response = bus
        .handle(Message::Command(Command::CheckTableExists {
            table_name: "test_table".to_string(),
        }))
        .await
        .expect("handler does not fail on missing tables");

    assert_eq!(
        response,
        Response::Error(DomainError::TableDoesNotExist {
            table_name: "test_table".to_string(),
        })
    );
}

#[tokio::test]
async fn test_check_table_state_registers_config_and_orders_checks() {
    let Setup {
        bus, table_configs, ..
    } = setup(Vec::new());
    let expected = table_config("test_table");

    let response = bus
        .handle(Message::Command(Command::CheckTableState {
            expected: expected.clone(),
        }))
        .await
        .expect("plan composition is infallible");

    assert_eq!(
        table_configs
            .get_table_config("test_table")
            .expect("config registered"),
        expected
    );

    let Response::Messages(plan) = response else {
        panic!("expected an ordered plan, got: {response:?}");
    };
    let shape: Vec<&str> = plan
        .iter()
        .map(|message| match message {
            Message::Command(Command::CheckTableExists { .. }) => "exists",
            Message::Command(Command::CheckForNewUpstreamDependencies { .. }) => "upstream",
            Message::Command(Command::CheckTableDefinition { .. }) => "definition",
            Message::Command(Command::CheckTablePartitionField { .. }) => "partition_field",
            Message::Command(Command::CheckTableSchema { .. }) => "schema",
            Message::Command(Command::CheckTablePartitionsAreNotEmpty { .. }) => "not_empty",
            Message::Command(Command::CheckTablePartitions { .. }) => "partitions",
            Message::Event(Event::TableUpToDate { .. }) => "up_to_date",
            other => panic!("unexpected plan entry: {other:?}"),
        })
        .collect();
    assert_eq!(
        shape,
        vec![
            "exists",
            "upstream",
            "definition",
            "partition_field",
            "schema",
            "not_empty",
            "partitions",
            "up_to_date",
        ]
    );
}

#[tokio::test]
async fn test_update_table_partition_writes_partition() {
    let Setup { bus, tables, .. } = setup(vec![table_metadata("test_table")]);

    bus.handle(Message::Command(Command::UpdateTablePartition {
        table_name: "test_table".to_string(),
        query: "SELECT 1".to_string(),
        partition: "2024-01-01".to_string(),
    }))
    .await
    .expect("write succeeds");

    let metadata = tables.metadata("test_table").expect("table exists");
    assert!(metadata.partitions.contains(&"2024-01-01".to_string()));
}

#[tokio::test]
async fn test_plan_backfill_updates_all_partitions_in_order() {
    let Setup { bus, queries, .. } = setup(Vec::new());
    queries.add_query("test_table", static_query("SELECT 1"));

    let response = bus
        .handle(Message::Command(Command::PlanBackfill {
            table_name: "test_table".to_string(),
            partitions: strings(&["2024-01-01", "2024-01-02", "2024-01-03"]),
        }))
        .await
        .expect("plan renders");

    let expected: Vec<Message> = ["2024-01-01", "2024-01-02", "2024-01-03"]
        .into_iter()
        .map(|partition| {
            Message::Command(Command::UpdateTablePartition {
                table_name: "test_table".to_string(),
                query: "SELECT 1".to_string(),
                partition: partition.to_string(),
            })
        })
        .collect();
    assert_eq!(response, Response::Messages(expected));
}

#[tokio::test]
async fn test_plan_backfill_overrides_table_name_in_query() {
    let Setup { bus, queries, .. } = setup(Vec::new());

    let mut environment_fields = TemplateFields::new();
    environment_fields.insert(
        "table_name".to_string(),
        Value::from("different_table_name"),
    );
    let template = QueryTemplate::new(
        "{{ table_name }} {{ run_day }}",
        environment_fields,
        TemplateFields::new(),
    )
    .expect("valid template");
    queries.add_query("stub_table_name", template.into_renderer());

    let response = bus
        .handle(Message::Command(Command::PlanBackfill {
            table_name: "stub_table_name".to_string(),
            partitions: strings(&["2024-01-01"]),
        }))
        .await
        .expect("plan renders");

    assert_eq!(
        response,
        Response::Messages(vec![Message::Command(Command::UpdateTablePartition {
            table_name: "stub_table_name".to_string(),
            query: "stub_table_name 2024-01-01".to_string(),
            partition: "2024-01-01".to_string(),
        })])
    );
}

#[tokio::test]
async fn test_upstream_created_after_downstream_update_is_reported() {
    let mut upstream = table_metadata("upstream_table");
    upstream.created = date("2024-01-02");
    let mut downstream = table_metadata("downstream_table");
    downstream.updated = date("2024-01-01");
    let Setup { bus, .. } = setup(vec![upstream, downstream]);

    let response = bus
        .handle(Message::Command(Command::CheckForNewUpstreamDependencies {
            table_name: "downstream_table".to_string(),
            upstream_table_names: strings(&["upstream_table"]),
        }))
        .await
        .expect("check runs");

    assert_eq!(
        response,
        Response::Error(DomainError::NewUpstreamDependenciesSinceLastUpdate {
            table_name: "downstream_table".to_string(),
        })
    );
}

#[tokio::test]
async fn test_upstream_created_before_downstream_update_is_up_to_date() {
    let mut upstream = table_metadata("upstream_table");
    upstream.created = date("2024-01-01");
    let mut downstream = table_metadata("downstream_table");
    downstream.updated = date("2024-01-02");
    let Setup { bus, .. } = setup(vec![upstream, downstream]);

    let response = bus
        .handle(Message::Command(Command::CheckForNewUpstreamDependencies {
            table_name: "downstream_table".to_string(),
            upstream_table_names: strings(&["upstream_table"]),
        }))
        .await
        .expect("check runs");

    assert_eq!(
        response,
        Response::Event(Event::NoNewUpstreamDependencies {
            table_name: "downstream_table".to_string(),
        })
    );
}

#[tokio::test]
async fn test_partitions_before_the_expected_window_are_reported_as_excess() {
    let mut existing = table_metadata("test_table");
    existing.partitions = strings(&["2024-01-01", "2024-01-02"]);
    let Setup {
        bus, table_configs, ..
    } = setup(vec![existing]);

    let mut config = table_config("test_table");
    config.partitions = strings(&["2024-01-02"]);
    table_configs.add_table_config(config);

    let response = bus
        .handle(Message::Command(Command::CheckTablePartitions {
            table_name: "test_table".to_string(),
            expected_partitions: strings(&["2024-01-02"]),
        }))
        .await
        .expect("check runs");

    assert_eq!(
        response,
        Response::Error(DomainError::ExistingPartitionsExceedExpectations {
            table_name: "test_table".to_string(),
        })
    );
}

#[tokio::test]
async fn test_missing_partitions_preserve_expected_order() {
    let mut existing = table_metadata("test_table");
    existing.partitions = strings(&["2024-01-02"]);
    let Setup {
        bus, table_configs, ..
    } = setup(vec![existing]);

    let mut config = table_config("test_table");
    config.partitions = strings(&["2024-01-02", "2024-01-03", "2024-01-04"]);
    table_configs.add_table_config(config);

    let response = bus
        .handle(Message::Command(Command::CheckTablePartitions {
            table_name: "test_table".to_string(),
            expected_partitions: strings(&["2024-01-02", "2024-01-03", "2024-01-04"]),
        }))
        .await
        .expect("check runs");

    assert_eq!(
        response,
        Response::Error(DomainError::PartitionsDoNotMatchExpectation {
            table_name: "test_table".to_string(),
            missing_partitions: strings(&["2024-01-03", "2024-01-04"]),
        })
    );
}

#[tokio::test]
async fn test_create_table_is_guarded_against_existing_tables() {
    let existing = table_metadata("test_table");
    let Setup { bus, .. } = setup(vec![existing.clone()]);

    let response = bus
        .handle(Message::Command(Command::CreateTable {
            table_name: "test_table".to_string(),
        }))
        .await
        .expect("guard runs");

    assert_eq!(
        response,
        Response::Error(DomainError::TableAlreadyExists { metadata: existing })
    );
}

#[tokio::test]
async fn test_can_add_query() {
    let Setup { mut bus, queries, .. } = setup(Vec::new());

    bus.dispatch(Command::AddQuery {
        query_name: "stub_query_name".to_string(),
        query_renderer: static_query("stub_query"),
    })
    .await
    .expect("query registration succeeds");

    assert_eq!(
        queries
            .get_query("stub_query_name", "unused", None)
            .expect("query registered"),
        "stub_query"
    );
}

#[tokio::test]
async fn test_can_replace_table() {
    let mut replaced = table_metadata("stub_table_name");
    replaced.definition = "stub_definition".to_string();
    let mut replacement = table_metadata("stub_replacement_table_name");
    replacement.definition = "stub_replacement_definition".to_string();
    let Setup { mut bus, tables, .. } = setup(vec![replaced, replacement]);

    bus.dispatch(Command::ReplaceTable {
        table_name: "stub_table_name".to_string(),
        replacement_table_name: "stub_replacement_table_name".to_string(),
    })
    .await
    .expect("replacement succeeds");

    assert_eq!(
        tables
            .metadata("stub_table_name")
            .expect("table still addressable")
            .definition,
        "stub_replacement_definition"
    );
}

#[tokio::test]
async fn test_sync_unpartitioned_table_writes_the_whole_table() {
    let Setup { mut bus, tables, .. } = setup(Vec::new());

    bus.dispatch(Command::SyncUnpartitionedTable {
        table_name: "stub_table_name".to_string(),
        query: "SELECT 1".to_string(),
    })
    .await
    .expect("write succeeds");

    assert_eq!(tables.table_writes(), strings(&["stub_table_name"]));
    assert_eq!(
        bus.log().last(),
        Some(&Message::Event(Event::TableSynchronized {
            table_name: "stub_table_name".to_string(),
        }))
    );
}

#[test]
fn test_every_structural_drift_triggers_a_sideload() {
    let sideloads = [
        DomainError::PartitionFieldDoesNotMatchExpectation {
            table_name: "t".to_string(),
        },
        DomainError::SchemaDoesNotMatchExpectation {
            table_name: "t".to_string(),
        },
        DomainError::DefinitionDoesNotMatchExpectation {
            table_name: "t".to_string(),
        },
        DomainError::NewUpstreamDependenciesSinceLastUpdate {
            table_name: "t".to_string(),
        },
        DomainError::ExistingPartitionsExceedExpectations {
            table_name: "t".to_string(),
        },
    ];

    for error in sideloads {
        assert_eq!(
            trigger_for(&error),
            Some(Command::PlanSideload {
                table_name: "t".to_string(),
            }),
            "expected a sideload for {error:?}"
        );
    }

    assert_eq!(
        trigger_for(&DomainError::TableDoesNotExist {
            table_name: "t".to_string(),
        }),
        Some(Command::CreateTable {
            table_name: "t".to_string(),
        })
    );
    assert_eq!(
        trigger_for(&DomainError::TableHasNoPartitions {
            table_name: "t".to_string(),
            missing_partitions: strings(&["2024-01-01"]),
        }),
        Some(Command::PlanBackfill {
            table_name: "t".to_string(),
            partitions: strings(&["2024-01-01"]),
        })
    );
    assert_eq!(
        trigger_for(&DomainError::TableAlreadyExists {
            metadata: common::table_metadata("t"),
        }),
        None
    );
}

#[tokio::test]
async fn test_schema_check_reads_expectation_from_registered_config() {
    let mut existing = table_metadata("test_table");
    existing.schema = Vec::new();
    let Setup {
        bus, table_configs, ..
    } = setup(vec![existing]);
    table_configs.add_table_config(table_config("test_table"));

    let response = bus
        .handle(Message::Command(Command::CheckTableSchema {
            table_name: "test_table".to_string(),
            expected_schema: stub_schema(),
        }))
        .await
        .expect("check runs");

    assert_eq!(
        response,
        Response::Error(DomainError::SchemaDoesNotMatchExpectation {
            table_name: "test_table".to_string(),
        })
    );
}
