use super::LoggingError;
use crate::utils::str_bool;
use std::env;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

const CRATE_TARGET: &str = "lsst_rsp";
const LOG_LEVEL_ENV_VAR: &str = "LOG_LEVEL";

/// Represents a custom time stamp format for logging.
#[derive(Debug, PartialEq, Clone)]
pub struct TimestampFormat(pub(crate) String);

impl Default for TimestampFormat {
    fn default() -> Self {
        Self("%Y-%m-%dT%H:%M:%S".to_string())
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct LoggingConfig {
    pub(crate) debug: bool,
    pub(crate) target: bool,
    pub(crate) timestamp: TimestampFormat,
}

impl LoggingConfig {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Default::default()
        }
    }

    /// Debug mode follows `DEBUG`, read with [str_bool].
    pub fn from_env() -> Self {
        Self::new(env::var("DEBUG").map(|v| str_bool(&v)).unwrap_or_default())
    }

    pub fn level(&self) -> Level {
        if self.debug { Level::DEBUG } else { Level::INFO }
    }

    /// `lsst_rsp=<level>` unless `LOG_LEVEL` holds other directives.
    pub fn logging_filter(&self) -> Result<EnvFilter, LoggingError> {
        let level = self.level().to_string().to_lowercase();
        let crate_directive = format!("{CRATE_TARGET}={level}")
            .parse::<Directive>()
            .map_err(|err| LoggingError::InvalidDirective(err.to_string()))?;

        Ok(EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .with_env_var(LOG_LEVEL_ENV_VAR)
            .from_env_lossy()
            .add_directive(crate_directive))
    }
}
