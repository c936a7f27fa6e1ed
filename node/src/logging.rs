//! # Structured Logging
//!
//! Tracing subscriber setup for the node. The output format is picked on
//! the command line ([`LogFormat`] is a clap value enum, so `--log-format`
//! validates itself) and filtering follows `RUST_LOG`.
//!
//! All log output goes to stderr so stdout stays available for structured
//! data (keygen output, piped API responses).

use std::io;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format, selectable via `--log-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable output with source locations. For local development.
    Pretty,
    /// JSON lines. For log aggregation.
    Json,
}

/// Installs the global tracing subscriber. Call once, early in `main()`;
/// a second call panics.
///
/// `default_directives` applies when `RUST_LOG` is unset, e.g.
/// `"strata_node=info,strata_vault=info"`. When set, `RUST_LOG` wins and
/// uses the usual `EnvFilter` directive syntax:
///
/// ```text
/// RUST_LOG=strata_node=debug,strata_vault=info,tower_http=debug
/// ```
pub fn init_logging(default_directives: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    let base = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => base
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init(),
        LogFormat::Json => base
            .with(fmt::layer().json().with_writer(io::stderr).with_target(true))
            .init(),
    }

    tracing::info!(?format, "logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn value_enum_exposes_both_formats() {
        let names: Vec<_> = LogFormat::value_variants()
            .iter()
            .map(|v| v.to_possible_value().unwrap().get_name().to_string())
            .collect();
        assert_eq!(names, ["pretty", "json"]);
    }
}
