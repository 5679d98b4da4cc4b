//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the `log_filter` from the config file
//! is used.

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter {filter:?}: {source}")]
    Filter {
        filter: String,
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(tracing::subscriber::SetGlobalDefaultError),
}

fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|source| LoggingError::Filter {
        filter: directives.to_string(),
        source,
    })
}

pub fn init(fallback_filter: &str) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(fallback_filter)?,
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(false));
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)
}
