//! Logging configuration and initialization.
//!
//! `tracing` with environment-based filtering; human-readable or JSON
//! output.

use std::sync::Once;

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Initialize the global tracing subscriber from the environment.
///
/// - `TABLEFORM_LOG_LEVEL` sets the filter (falls back to `RUST_LOG`, then
///   to `info`)
/// - `TABLEFORM_LOG_FORMAT=json` switches to JSON output
pub fn init_tracing() {
    let level = std::env::var("TABLEFORM_LOG_LEVEL").ok();
    let use_json = matches!(
        std::env::var("TABLEFORM_LOG_FORMAT").as_deref(),
        Ok(format) if format.eq_ignore_ascii_case("json")
    );
    init_tracing_with(level.as_deref(), use_json);
}

/// Initialize the global tracing subscriber with explicit options.
///
/// `level` overrides the environment filter; `use_json` picks structured
/// JSON output over the human-readable format with file/line locations.
pub fn init_tracing_with(level: Option<&str>, use_json: bool) {
    let format: Box<dyn Layer<Registry> + Send + Sync> = if use_json {
        fmt::layer()
            .json()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let subscriber = Registry::default()
        .with(format)
        .with(filter_from(level))
        .with(ErrorLayer::default());

    tracing::subscriber::set_global_default(subscriber)
        .expect("a global tracing subscriber is already installed");
}

fn filter_from(level: Option<&str>) -> EnvFilter {
    level.map(EnvFilter::new).unwrap_or_else(|| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Initialize logging for tests with the test writer. Safe to call from
/// every test; only the first call installs a subscriber.
pub fn init_test_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("tableform=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}
