use super::config::LoggingConfig;
use super::{LayerBox, LoggingError};
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::format::PrettyFields;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Human readable output, used when debugging.
pub fn console(config: &LoggingConfig) -> Result<LayerBox, LoggingError> {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(config.target)
        .with_timer(ChronoLocal::new(config.timestamp.0.clone()))
        .fmt_fields(PrettyFields::new())
        .with_filter(config.logging_filter()?)
        .boxed();
    Ok(layer)
}

/// One JSON object per event, for log collection.
pub fn json(config: &LoggingConfig) -> Result<LayerBox, LoggingError> {
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_timer(ChronoLocal::rfc_3339())
        .with_filter(config.logging_filter()?)
        .boxed();
    Ok(layer)
}
