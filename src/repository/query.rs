use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::{Result, TableformError};
use crate::template::{QueryRenderer, TemplateFields};
use crate::utils;

/// Registry of query renderers, keyed by table name.
pub trait QueryRepository: Send + Sync {
    /// Renders the named query for one run day. `run_time_fields` override
    /// every construction-time field of the renderer.
    fn get_query(
        &self,
        query_name: &str,
        run_day: &str,
        run_time_fields: Option<TemplateFields>,
    ) -> Result<String>;

    /// Stable integer fingerprint of the named query; used to name
    /// side-load tables.
    fn get_query_hash(&self, query_name: &str) -> Result<u128>;

    fn copy_query(&self, source_query_name: &str, destination_query_name: &str) -> Result<()>;

    fn add_query(&self, query_name: &str, query_renderer: QueryRenderer);
}

/// The default, in-memory query registry.
#[derive(Default)]
pub struct InMemoryQueryRepository {
    registry: Mutex<HashMap<String, QueryRenderer>>,
}

impl InMemoryQueryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn renderer(&self, query_name: &str) -> Result<QueryRenderer> {
        self.registry
            .lock()
            .expect("query registry mutex poisoned")
            .get(query_name)
            .cloned()
            .ok_or_else(|| TableformError::QueryNotFound {
                query_name: query_name.to_string(),
            })
    }
}

impl QueryRepository for InMemoryQueryRepository {
    fn get_query(
        &self,
        query_name: &str,
        run_day: &str,
        run_time_fields: Option<TemplateFields>,
    ) -> Result<String> {
        self.renderer(query_name)?.render(run_day, run_time_fields)
    }

    fn get_query_hash(&self, query_name: &str) -> Result<u128> {
        let query = self.get_query(query_name, "unused", None)?;
        Ok(utils::hash_string(&query))
    }

    fn copy_query(&self, source_query_name: &str, destination_query_name: &str) -> Result<()> {
        let renderer = self.renderer(source_query_name)?;
        self.registry
            .lock()
            .expect("query registry mutex poisoned")
            .insert(destination_query_name.to_string(), renderer);
        Ok(())
    }

    fn add_query(&self, query_name: &str, query_renderer: QueryRenderer) {
        self.registry
            .lock()
            .expect("query registry mutex poisoned")
            .insert(query_name.to_string(), query_renderer);
    }
}
