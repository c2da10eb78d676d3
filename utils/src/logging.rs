//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence over the configured level, so a running
//! daemon can be narrowed to e.g. `txflow_ingest::triggers=debug` without a
//! config change.

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Coloured single-line output.
    #[default]
    Human,
    /// Newline-delimited JSON with span fields flattened into each event.
    Json,
}

/// Install the global subscriber.
///
/// Span close events are emitted so each `tx_process` span logs its own
/// busy/idle time. Fails if a subscriber is already installed.
pub fn init_logging(format: LogFormat, level: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Human => registry
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
    }
}
