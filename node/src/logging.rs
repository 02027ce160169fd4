//! # Structured Logging
//!
//! Initializes the `tracing` subscriber with a pretty or JSON format and
//! `RUST_LOG` filtering. Output goes to stderr so stdout stays clean for
//! exported documents and metrics.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "xpxd=info,xpx_app=info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for local operation.
    Pretty,
    /// JSON lines for log aggregation.
    Json,
}

impl LogFormat {
    /// Accepts "json" or "pretty" (case-insensitive). Anything else is
    /// `Pretty`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global subscriber. Call once, early in `main()`.
///
/// `RUST_LOG` overrides `default_level`, e.g.:
///
/// ```text
/// RUST_LOG=xpxd=debug,xpx_app=debug
/// ```
pub fn init_logging(default_level: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
                .init();
        }
    }

    tracing::debug!(?format, "logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_is_lenient() {
        assert_eq!(LogFormat::from_str_lossy("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str_lossy("yaml"), LogFormat::Pretty);
    }
}
