use clap::ValueEnum;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Transport crates whose debug output drowns the modeling logs.
pub const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "h2", "tower", "tower_http"];

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn directives(level: &str) -> String {
    NOISY_MODULES
        .iter()
        .fold(level.to_string(), |acc, module| format!("{acc},{module}=warn"))
}

/// `RUST_LOG` wins over the configured level when set.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(level)))
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(level: &str, format: LogFormat) {
    let subscriber = tracing_subscriber::registry().with(build_filter(level));

    match format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_writer(std::io::stderr);
            let _ = subscriber.with(layer).try_init();
        }
        LogFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_target(true)
                .with_writer(std::io::stderr);
            let _ = subscriber.with(layer).try_init();
        }
    }

    tracing::debug!(level, ?format, "logging initialized");
}
