//! Log output setup.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Log line encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-friendly text lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` selects levels; without it everything at `info` and above is kept.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
