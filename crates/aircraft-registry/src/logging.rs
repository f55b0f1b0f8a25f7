//! Tracing setup for `acreg`.
//!
//! Log lines go to stderr so `--json` reports on stdout stay parseable.
//! The registry's own targets follow the chosen [`Verbosity`] while the HTTP
//! and TLS stack stays at `warn` unless tracing is requested. A `RUST_LOG`
//! value replaces the whole filter.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Targets that belong to this project.
const OWN_TARGETS: [&str; 2] = ["aircraft_registry", "acreg"];

/// How much the CLI logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Sync, review and release milestones.
    #[default]
    Normal,
    /// Adds per-step detail such as schema checks and state transitions.
    Verbose,
    /// Adds per-row decisions and dependency debug output.
    Trace,
}

impl Verbosity {
    /// Map `--quiet` and the number of `-v` flags; `--quiet` wins.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Most detailed level logged for the registry's own targets.
    #[must_use]
    pub fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::INFO,
            Self::Verbose => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    #[must_use]
    pub fn directive(self) -> String {
        let dependencies = if self == Self::Trace { "debug" } else { "warn" };
        let level = self.level().to_string().to_ascii_lowercase();
        std::iter::once(dependencies.to_string())
            .chain(OWN_TARGETS.iter().map(|target| format!("{target}={level}")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber.
///
/// Targets are shown from [`Verbosity::Verbose`] up, source locations only
/// at [`Verbosity::Trace`]. Calling this again is a no-op.
///
/// ```no_run
/// use aircraft_registry::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let locations = verbosity == Verbosity::Trace;
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity >= Verbosity::Verbose)
        .with_file(locations)
        .with_line_number(locations);

    // A subscriber may already be installed by an embedding program
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags_quiet_wins() {
        assert_eq!(Verbosity::from_flags(true, 0), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 5), Verbosity::Trace);
    }

    #[test]
    fn test_levels_increase_with_verbosity() {
        assert!(Verbosity::Quiet < Verbosity::Trace);
        assert_eq!(Verbosity::Quiet.level(), LevelFilter::ERROR);
        assert_eq!(Verbosity::default().level(), LevelFilter::INFO);
        assert_eq!(Verbosity::Trace.level(), LevelFilter::TRACE);
    }

    #[test]
    fn test_directive_keeps_http_stack_at_warn() {
        let directive = Verbosity::Verbose.directive();
        assert_eq!(directive, "warn,aircraft_registry=debug,acreg=debug");
        assert!(EnvFilter::try_new(&directive).is_ok());
    }

    #[test]
    fn test_trace_directive_opens_dependencies() {
        assert!(Verbosity::Trace.directive().starts_with("debug,"));
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(Verbosity::Quiet);
        init_logging(Verbosity::Trace);
    }
}
