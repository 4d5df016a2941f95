//! Log output setup.
//!
//! Logs go to stderr, as JSON lines when `logging.json` is set and in the
//! compact text format otherwise. `RUST_LOG` overrides `logging.level`.

use tracing::{debug, Subscriber};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigLoadError, LoggingSettings};

/// Installs the global subscriber described by `settings`.
///
/// A subscriber that is already installed is left in place.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), ConfigLoadError> {
    let subscriber = build_subscriber(settings, std::io::stderr)?;
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("Global subscriber already installed");
    }
    Ok(())
}

fn build_subscriber<W>(
    settings: &LoggingSettings,
    writer: W,
) -> Result<Box<dyn Subscriber + Send + Sync>, ConfigLoadError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let level = settings.level()?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let output = fmt::layer().with_writer(writer).with_target(true);

    let registry = tracing_subscriber::registry().with(filter);
    Ok(if settings.json {
        Box::new(registry.with(output.json().with_current_span(true).with_span_list(false)))
    } else {
        Box::new(registry.with(output.compact()))
    })
}
