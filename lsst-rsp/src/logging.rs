//! Tools to set up a [tracing_subscriber] for the startup commands.
pub mod config;
pub mod layers;

use config::LoggingConfig;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid logging directive: `{0}`")]
    InvalidDirective(String),
    #[error("init logging error: `{0}`")]
    TryInitError(String),
}

/// Represents a registry layer to report tracing data to any destination.
pub type LayerBox = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Installs the global subscriber: a human console layer in debug mode, JSON otherwise.
pub fn try_init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let layer = if config.debug {
        layers::console(config)?
    } else {
        layers::json(config)?
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|_| {
            LoggingError::TryInitError("unable to set global logging subscriber".to_string())
        })?;

    debug!("Logging initialized successfully");
    Ok(())
}
