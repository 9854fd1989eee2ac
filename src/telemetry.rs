use crate::config::{Config, TelemetryConfig};
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Initialize logging. `RUST_LOG` wins over the configured level.
///
/// # Errors
/// Returns error if the log file or its directory cannot be created
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let filter = build_filter(&config.level)?;

    let Some(log_path) = config.log_path.as_deref() else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    };

    let expanded_path = Config::expand_path(log_path)?;

    if let Some(parent) = expanded_path.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&expanded_path)
        .context("failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_target(false)
        .with_ansi(false)
        .init();

    tracing::info!("logging to {}", expanded_path.display());

    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{level}'")),
    }
}
