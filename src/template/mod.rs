//! Layered SQL query templating on top of Minijinja.
//!
//! A [`QueryTemplate`] binds template text to two construction-time field
//! layers (user-defined and environment). The reserved `run_day` field and
//! any per-render fields are supplied only at render time, so one template
//! serves every partition of a backfill.

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use minijinja::value::Value;
use minijinja::{Environment, Error as MjError, ErrorKind};

use crate::errors::{Result, TableformError};
use crate::template::registry::TemplateRegistry;

pub mod registry;

/// Template fields that may only be supplied at render time.
pub const RUNTIME_TEMPLATE_FIELDS: &[&str] = &["run_day"];

/// Helpers resolved by the template environment rather than the render
/// context; never required as fields.
const TEMPLATE_HELPERS: &[&str] = &["raise_template_exception"];

/// Ordered field map used for every template layer.
///
/// Insertion order is preserved so that rendering is deterministic in its
/// inputs.
pub type TemplateFields = IndexMap<String, Value>;

/// The process-wide template environment.
///
/// Built once; the only registered helper is `raise_template_exception`,
/// which lets a template abort its own expansion:
///
/// ```jinja
/// {% if backfill_days > 30 %}{{ raise_template_exception("window too wide") }}{% endif %}
/// ```
fn template_environment() -> &'static Environment<'static> {
    static ENVIRONMENT: OnceLock<Environment<'static>> = OnceLock::new();
    ENVIRONMENT.get_or_init(|| {
        let mut env = Environment::new();
        env.add_function(
            "raise_template_exception",
            |message: String| -> std::result::Result<Value, MjError> {
                Err(MjError::new(ErrorKind::InvalidOperation, message))
            },
        );
        env
    })
}

/// A rendering function from `(run_day, run-time fields)` to query text.
///
/// Renderers close over their construction-time fields and are stored in the
/// query repository keyed by table name; they are cheap to clone and may be
/// copied to a side-load name. Equality is pointer identity, which keeps the
/// commands that carry renderers comparable.
#[derive(Clone)]
pub struct QueryRenderer(Arc<dyn Fn(&str, Option<TemplateFields>) -> Result<String> + Send + Sync>);

impl QueryRenderer {
    pub fn new(
        render: impl Fn(&str, Option<TemplateFields>) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(render))
    }

    pub fn render(&self, run_day: &str, run_time_fields: Option<TemplateFields>) -> Result<String> {
        (self.0)(run_day, run_time_fields)
    }
}

impl fmt::Debug for QueryRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueryRenderer(..)")
    }
}

impl PartialEq for QueryRenderer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A query template plus its construction-time field layers.
///
/// Construction rejects templates that smuggle a reserved runtime field in
/// through either layer, and templates whose undeclared variables are not
/// covered by the provided fields.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    template: String,
    environment_fields: TemplateFields,
    user_defined_fields: TemplateFields,
}

impl QueryTemplate {
    pub fn new(
        template: impl Into<String>,
        environment_fields: TemplateFields,
        user_defined_fields: TemplateFields,
    ) -> Result<Self> {
        let candidate = Self {
            template: template.into(),
            environment_fields,
            user_defined_fields,
        };

        let provided = candidate.provided_fields();
        let mut reserved: Vec<String> = provided
            .keys()
            .filter(|key| RUNTIME_TEMPLATE_FIELDS.contains(&key.as_str()))
            .cloned()
            .collect();
        if !reserved.is_empty() {
            reserved.sort();
            return Err(TableformError::ReservedTemplateFields { fields: reserved });
        }

        let mut missing: Vec<String> = candidate
            .required_fields()?
            .into_iter()
            .filter(|field| !provided.contains_key(field))
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(TableformError::MissingTemplateFields { fields: missing });
        }

        Ok(candidate)
    }

    /// Binds a named template from a registry.
    pub fn from_registry(
        name: &str,
        environment_fields: TemplateFields,
        user_defined_fields: TemplateFields,
        registry: &TemplateRegistry,
    ) -> Result<Self> {
        let template = registry.get_template(name)?;
        Self::new(template, environment_fields, user_defined_fields)
    }

    /// Expands the template for one run day.
    ///
    /// Field precedence, lowest to highest: user-defined, environment,
    /// `run_day`, run-time fields.
    pub fn render(
        &self,
        run_day: &str,
        run_time_fields: Option<TemplateFields>,
    ) -> Result<String> {
        let mut fields = self.provided_fields();
        fields.insert("run_day".to_string(), Value::from(run_day));
        if let Some(run_time_fields) = run_time_fields {
            fields.extend(run_time_fields);
        }

        let env = template_environment();
        let rendered = env.template_from_str(&self.template)?.render(&fields)?;
        Ok(rendered)
    }

    /// Converts the template into a renderer closure suitable for the query
    /// repository.
    pub fn into_renderer(self) -> QueryRenderer {
        QueryRenderer::new(move |run_day, run_time_fields| self.render(run_day, run_time_fields))
    }

    /// Construction-time fields, with environment fields winning conflicts.
    pub fn provided_fields(&self) -> TemplateFields {
        let mut fields = self.user_defined_fields.clone();
        fields.extend(self.environment_fields.clone());
        fields
    }

    /// Undeclared template variables minus the reserved runtime set.
    fn required_fields(&self) -> Result<Vec<String>> {
        let env = template_environment();
        let undeclared = env
            .template_from_str(&self.template)?
            .undeclared_variables(true);
        Ok(undeclared
            .into_iter()
            .filter(|name| {
                !RUNTIME_TEMPLATE_FIELDS.contains(&name.as_str())
                    && !TEMPLATE_HELPERS.contains(&name.as_str())
            })
            .collect())
    }
}
