//! Structured logging setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "info";

/// Filter for the given directive string, falling back to `RUST_LOG` and
/// then to `info`. A malformed explicit directive is an error rather than
/// silently logging everything.
pub fn log_filter(directive: Option<&str>) -> anyhow::Result<EnvFilter> {
    match directive {
        Some(directive) => Ok(EnvFilter::try_new(directive)?),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))),
    }
}

/// Install the global JSON subscriber. Fails if one is already installed.
pub fn init_logging(directive: Option<&str>) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(log_filter(directive)?)
        .with(fmt::layer().json().with_current_span(false))
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn explicit_directives() {
        let filter = log_filter(Some("warn,skillgap_api=debug")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        assert!(log_filter(Some("skillgap_api=loud")).is_err());
    }
}
