//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ConfigError, RelayConfig};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins if set; otherwise the filter comes from
/// [`RelayConfig::log_directive`]. With `log_file` set, output is appended
/// to that file without ANSI colours instead of going to stdout.
///
/// Calling it again after a subscriber is installed does nothing.
pub fn init(config: &RelayConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_directive()));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
            registry
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_target(true),
                )
                .try_init()
        }
        None => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    match installed {
        Ok(()) => tracing::debug!(filter = config.log_directive(), "logging initialised"),
        Err(e) => tracing::debug!(error = %e, "tracing subscriber already installed"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let config = RelayConfig::default();
        assert!(init(&config).is_ok());
        assert!(init(&config).is_ok());
    }

    #[test]
    fn test_init_unwritable_log_file_is_io_error() {
        let config = RelayConfig {
            log_file: Some("/nonexistent-dir/mcrelay/relay.log".into()),
            ..RelayConfig::default()
        };
        assert!(matches!(init(&config), Err(ConfigError::Io { .. })));
    }
}
