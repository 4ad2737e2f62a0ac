//! Tracing subscriber setup.
//!
//! `RUST_LOG` always wins over the configured default filter.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

use crate::config::{LogFormat, PresenceSettings};

/// How log output is filtered and rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Filter directives used when `RUST_LOG` is not set
    pub default_filter: String,
    pub format: LogFormat,
    /// Log span open/close
    pub span_events: bool,
    /// Include file and line of each event
    pub source_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            format: LogFormat::Pretty,
            span_events: false,
            source_location: true,
        }
    }
}

impl TracingConfig {
    /// Verbose presence logs, human-readable
    #[must_use]
    pub fn development() -> Self {
        Self {
            default_filter: "info,presence_client=debug,presence_transport=debug".to_string(),
            format: LogFormat::Pretty,
            span_events: true,
            source_location: true,
        }
    }

    /// Info level, one JSON object per line
    #[must_use]
    pub fn production() -> Self {
        Self {
            default_filter: "info".to_string(),
            format: LogFormat::Json,
            span_events: false,
            source_location: false,
        }
    }

    /// Preset for the configured environment, rendered in the configured format
    #[must_use]
    pub fn from_settings(settings: &PresenceSettings) -> Self {
        let preset = if settings.env.is_development() {
            Self::development()
        } else {
            Self::production()
        };
        Self {
            format: settings.log_format,
            ..preset
        }
    }
}

/// Install the global subscriber with default settings.
///
/// # Panics
/// Panics if a global subscriber is already installed.
pub fn init_tracing() {
    init_tracing_with_config(TracingConfig::default());
}

/// Install the global subscriber.
///
/// # Panics
/// Panics if a global subscriber is already installed.
pub fn init_tracing_with_config(config: TracingConfig) {
    if let Err(e) = install(&config) {
        panic!("failed to initialize tracing: {e}");
    }
}

/// Install the global subscriber with default settings, if none is installed yet
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Install the global subscriber, if none is installed yet
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    install(&config).map_err(|_| TracingError::AlreadyInitialized)
}

fn install(config: &TracingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let output = fmt::layer()
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(span_events);
    let output = match config.format {
        LogFormat::Pretty => output.boxed(),
        LogFormat::Json => output.json().flatten_event(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()?;

    tracing::debug!(
        default_filter = %config.default_filter,
        format = ?config.format,
        "Tracing initialized"
    );
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}
