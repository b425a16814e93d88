//! # Tableform
//!
//! Declarative managed-table reconciliation engine for cloud data warehouses.
//!
//! ## Overview
//!
//! Tableform drives a warehouse-resident table to match an expected
//! specification — name, schema, partitioning, defining query, partition
//! list, upstream dependencies — choosing the cheapest repair for whatever
//! has drifted:
//!
//! - **In-place backfill** when only partitions are missing
//! - **Side-load rebuild** when structure or lineage drifted: the table is
//!   rebuilt under a temporary name, the original snapshotted to a backup,
//!   and the replacement swapped in
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tableform::engine::TableManager;
//! use tableform::domain::{SchemaField, TableConfig};
//! use tableform::repository::InMemoryQueryRepository;
//! use tableform::template::{QueryTemplate, TemplateFields};
//!
//! # async fn example(warehouse: Arc<dyn tableform::repository::TableRepository>) -> tableform::Result<()> {
//! let queries = Arc::new(InMemoryQueryRepository::new());
//! let mut manager = TableManager::from_repositories(warehouse, queries);
//!
//! let template = QueryTemplate::new(
//!     "SELECT user_id, day FROM source WHERE day = '{{ run_day }}'",
//!     TemplateFields::new(),
//!     TemplateFields::new(),
//! )?;
//!
//! manager
//!     .sync_partitioned_table(
//!         TableConfig {
//!             table_name: "user_activity".to_string(),
//!             schema: vec![
//!                 SchemaField::new("user_id", "STRING", "REQUIRED"),
//!                 SchemaField::new("day", "DATE", "REQUIRED"),
//!             ],
//!             partition_field: "day".to_string(),
//!             partitions: vec!["2024-01-01".to_string(), "2024-01-02".to_string()],
//!             definition: "SELECT user_id, day FROM source".to_string(),
//!             upstream_table_names: vec!["source".to_string()],
//!             expires: None,
//!         },
//!         template.into_renderer(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! TableManager → MessageBus → Handlers → repositories → warehouse
//! ```
//!
//! A facade operation builds a root command; the bus routes messages through
//! the handlers; state mismatches come back as domain errors whose
//! compensating commands run ahead of the remaining plan. Warehouse access
//! goes exclusively through the [`repository::TableRepository`] contract —
//! this crate ships no concrete drivers.
//!
//! ## Features
//!
//! - **SQL templating**: Minijinja query templates with layered fields and a
//!   render-time-only `run_day`
//! - **Bounded retries**: every mismatch repair is budgeted; exhaustion
//!   aborts with a terminal error naming the table
//! - **Post-mortem log**: every dispatched message, in order
//! - **Structured logging**: JSON and human-readable formats via `tracing`

// Public API exports
pub use errors::{Result, TableformError};

// Public modules
pub mod bus;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod log;
pub mod repository;
pub mod template;
pub mod utils;
