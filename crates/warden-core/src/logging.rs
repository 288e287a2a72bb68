//! Logging and tracing initialization for Warden.
//!
//! The log level is controlled by the `RUST_LOG` environment variable:
//!
//! ```bash
//! # Show all logs including SQL statements
//! RUST_LOG=debug warden-cleanup
//!
//! # Audit-log failures only, as JSON lines
//! LOG_FORMAT=json RUST_LOG=warn,warden::audit=error warden-cleanup
//! ```
//!
//! Audit write failures are emitted on the `warden::audit` target and cleanup
//! failures on `warden::cleanup`, so operators can route them separately.

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Output format of the `fmt` layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event, for log aggregation.
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT=json` selects [`LogFormat::Json`]; anything else is text.
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }

    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

type FmtLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Build the subscriber without installing it.
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn subscriber<W>(
    format: LogFormat,
    default_level: &str,
    writer: W,
) -> impl Subscriber + Send + Sync + use<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let layer: FmtLayer = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer().with_writer(writer).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry().with(filter).with(layer)
}

/// Install the global subscriber on stdout at `info`.
///
/// # Panics
///
/// This function will panic if called multiple times. Only call it once
/// at application startup.
pub fn init_logging(format: LogFormat) {
    subscriber(format, "info", std::io::stdout).init();
}

/// Install the global subscriber on stderr, keeping stdout free for command
/// output.
///
/// # Panics
///
/// This function will panic if called multiple times.
pub fn init_logging_stderr(format: LogFormat) {
    subscriber(format, "info", std::io::stderr).init();
}
