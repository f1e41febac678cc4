//! Logging setup for pagemend
//!
//! Diagnostics go to stderr through `tracing`; the report itself is printed to
//! stdout. `PAGEMEND_LOG` takes a full `EnvFilter` directive and wins over
//! `--verbose`.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, registry};

/// Environment variable holding a filter directive
pub const LOG_ENV: &str = "PAGEMEND_LOG";

/// Pick the filter directive from the env override and the verbosity flag
pub fn filter_directive(verbose: bool, env_override: Option<&str>) -> String {
    match env_override.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ if verbose => "pagemend=debug".to_string(),
        _ => "pagemend=warn".to_string(),
    }
}

/// Install the global subscriber
pub fn init_logging(verbose: bool) -> Result<()> {
    let env_override = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(verbose, env_override.as_deref());

    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| anyhow::anyhow!("Invalid {} directive '{}': {}", LOG_ENV, directive, e))?;

    let subscriber = registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(filter);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_is_quiet() {
        assert_eq!(filter_directive(false, None), "pagemend=warn");
    }

    #[test]
    fn test_verbose_directive() {
        assert_eq!(filter_directive(true, None), "pagemend=debug");
    }

    #[test]
    fn test_env_override_wins() {
        assert_eq!(filter_directive(true, Some("pagemend=trace")), "pagemend=trace");
        assert_eq!(filter_directive(false, Some("  ")), "pagemend=warn");
    }

    #[test]
    fn test_directives_parse() {
        for verbose in [false, true] {
            assert!(EnvFilter::try_new(filter_directive(verbose, None)).is_ok());
        }
    }
}
