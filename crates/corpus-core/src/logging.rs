//! Tracing subscriber setup for embedders
//!
//! Backends log storage decisions (dedup hits, blob writes, migration
//! runs) at debug level; this wires those targets up without forcing a
//! subscriber on hosts that already installed one.

use tracing_subscriber::EnvFilter;

/// Default directives when `RUST_LOG` is unset: storage internals at
/// debug, everything else at warn.
const DEFAULT_DIRECTIVES: &str = "warn,corpus_core=debug,corpus_store=debug";

/// Output encoding for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line, for log shippers
    Json,
}

/// Install the process-global tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise the corpus crates log at debug.
/// Returns `false` when another subscriber is already installed, so
/// embedding hosts keep control and repeated calls are harmless.
pub fn init_logging(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_are_well_formed() {
        // EnvFilter parses the directive list strictly through FromStr.
        assert!(DEFAULT_DIRECTIVES.parse::<EnvFilter>().is_ok());
        assert!(DEFAULT_DIRECTIVES.contains("corpus_core"));
        assert!(DEFAULT_DIRECTIVES.contains("corpus_store"));
    }

    #[test]
    fn test_only_first_install_wins() {
        let first = init_logging(LogFormat::Text);
        // Whatever the first call did, a second install is refused
        // rather than panicking.
        assert!(!init_logging(LogFormat::Json));
        assert!(!init_logging(LogFormat::Text));
        let _ = first;
    }
}
