//! Process-wide `tracing` setup
//!
//! Server startup and shutdown run inside a root span carrying the service
//! name and version.

use std::{fs::OpenOptions, str::FromStr, sync::Arc};

use tracing::{info_span, Span};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Output format selected by `logging.format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers
    Json,
    /// Multi-line human readable output
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!("Invalid log format: {other}")),
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `logging.level` when set. Output goes to stdout, or
/// is appended to `logging.file_path`.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let format = LogFormat::from_str(&config.format)?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| anyhow::anyhow!("Invalid log level {:?}: {e}", config.level))?;
    let writer = make_writer(config.file_path.as_deref())?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(writer),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_span_events(FmtSpan::CLOSE)
                    .with_file(false)
                    .with_writer(writer),
            )
            .try_init()?,
    }

    Ok(())
}

/// Root span for the server; everything logged inside it carries the
/// `service` and `version` fields
#[must_use]
pub fn service_span(config: &LoggingConfig) -> Span {
    info_span!(
        "root",
        service = %config.service_name,
        version = env!("CARGO_PKG_VERSION"),
    )
}

fn make_writer(file_path: Option<&str>) -> anyhow::Result<BoxMakeWriter> {
    match file_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("Cannot open log file {path}: {e}"))?;
            Ok(BoxMakeWriter::new(Arc::new(file)))
        }
        None => Ok(BoxMakeWriter::new(std::io::stdout)),
    }
}

/// Generate a correlation ID that ties together every log line of one login attempt
#[must_use]
pub fn generate_trace_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
