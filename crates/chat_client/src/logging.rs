//! Diagnostic logging setup.
//!
//! Logs go to stderr so they never interleave with transcript output on
//! stdout.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Builds the filter for `directives`, falling back to [`DEFAULT_LOG_FILTER`]
/// when they are absent or do not parse.
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber. Returns `false` when one was already
/// installed, which leaves the existing one in place.
pub fn init_logging(directives: Option<&str>) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::filter::LevelFilter;

    use super::{init_logging, log_filter};

    #[test]
    fn filter_falls_back_to_default_for_bad_directives() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(
            log_filter(Some("chat_client=loud")).max_level_hint(),
            Some(LevelFilter::WARN)
        );
        assert_eq!(
            log_filter(Some("chat_client=debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }

    #[test]
    fn second_init_is_a_no_op() {
        init_logging(Some("error"));
        assert!(!init_logging(Some("debug")));
    }
}
