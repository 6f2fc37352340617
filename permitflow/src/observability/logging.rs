//! Subscriber installation for applications embedding the engine.

use crate::config::LoggingConfig;
use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global `tracing` subscriber.
///
/// The filter comes from `PERMITFLOW_LOG` when set, otherwise from
/// `config.level`. Fails if the directive is invalid or a subscriber is
/// already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let directive = config.effective_level();
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
            .context("installing JSON log subscriber")?;
    } else {
        registry
            .with(fmt::layer().with_target(true))
            .try_init()
            .context("installing log subscriber")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_directive_is_rejected() {
        let config = LoggingConfig {
            level: "permitflow=verbose".to_string(),
            json: false,
        };
        if std::env::var(crate::config::LOG_ENV_VAR).is_err() {
            let err = init_logging(&config).unwrap_err();
            assert!(err.to_string().contains("invalid log filter"));
        }
    }

    #[test]
    fn test_second_install_fails() {
        let _ = init_logging(&LoggingConfig::default());
        let second = init_logging(&LoggingConfig {
            json: true,
            ..LoggingConfig::default()
        });

        assert!(second.is_err());
    }
}
