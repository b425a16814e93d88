use std::collections::HashMap;
use std::sync::Mutex;

use tracing::warn;

use crate::domain::TableConfig;
use crate::errors::{Result, TableformError};

/// Registry of expected table state, keyed by table name.
///
/// Configs are registered at the start of a table-state check and stay
/// addressable for the rest of the dispatch, so every attribute check reads
/// the same expectation.
pub trait TableConfigRepository: Send + Sync {
    fn get_table_config(&self, table_name: &str) -> Result<TableConfig>;

    /// Registers a config. Writing an existing key is permitted (retries
    /// re-register) and logged.
    fn add_table_config(&self, config: TableConfig);
}

/// The default, in-memory config registry.
#[derive(Default)]
pub struct InMemoryTableConfigRepository {
    configs: Mutex<HashMap<String, TableConfig>>,
}

impl InMemoryTableConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableConfigRepository for InMemoryTableConfigRepository {
    fn get_table_config(&self, table_name: &str) -> Result<TableConfig> {
        self.configs
            .lock()
            .expect("table config mutex poisoned")
            .get(table_name)
            .cloned()
            .ok_or_else(|| TableformError::ConfigNotFound {
                table_name: table_name.to_string(),
            })
    }

    fn add_table_config(&self, config: TableConfig) {
        let mut configs = self.configs.lock().expect("table config mutex poisoned");
        if configs.contains_key(&config.table_name) {
            warn!(
                table_name = %config.table_name,
                "table config already registered, overwriting"
            );
        }
        configs.insert(config.table_name.clone(), config);
    }
}
