//! Named template lookup.
//!
//! Producers are zero-argument closures so that file-backed templates are
//! read lazily, at the moment a template is bound.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::errors::{Result, TableformError};

/// Produces template text on demand.
pub type TemplateProducer = Arc<dyn Fn() -> Result<String> + Send + Sync>;

/// Maps template names to text producers, in-memory or file-backed.
#[derive(Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, TemplateProducer>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a producer under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, producer: TemplateProducer) {
        self.templates.insert(name.into(), producer);
    }

    /// Registers fixed template text under `name`.
    pub fn insert_text(&mut self, name: impl Into<String>, text: impl Into<String>) {
        let text = text.into();
        let producer: TemplateProducer = Arc::new(move || Ok(text.clone()));
        self.insert(name, producer);
    }

    /// Builds a registry from every SQL template file under `root`,
    /// recursively (`*.sql`, including suffixed variants like `*.sql.jinja`).
    ///
    /// Each template is registered under its file stem up to the first dot
    /// (`daily_rollup.sql` and `daily_rollup.sql.jinja` both register as
    /// `daily_rollup`). Files are read when the template is fetched, not at
    /// registration.
    pub fn from_dir(root: impl AsRef<Path>) -> Result<Self> {
        let mut registry = Self::new();

        for entry in WalkDir::new(root.as_ref()) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_sql = path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|name| name.split('.').skip(1).any(|seg| seg.eq_ignore_ascii_case("sql")))
                .unwrap_or(false);
            if !is_sql {
                continue;
            }

            let Some(name) = template_name(path) else {
                continue;
            };
            let path: PathBuf = path.to_path_buf();
            let producer: TemplateProducer =
                Arc::new(move || Ok(std::fs::read_to_string(&path)?));
            registry.insert(name, producer);
        }

        Ok(registry)
    }

    /// Fetches the text registered under `name`.
    pub fn get_template(&self, name: &str) -> Result<String> {
        let producer = self
            .templates
            .get(name)
            .ok_or_else(|| TableformError::TemplateNotFound {
                name: name.to_string(),
            })?;
        producer()
    }
}

fn template_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.split('.').next()?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}
