//! Runtime configuration derived from CLI flags.

use std::path::PathBuf;

use crate::error::FerryError;

/// Verbosity level controlling tracing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Suppress all output except errors
    Quiet,
    /// Normal output (info level)
    Normal,
    /// Verbose output (debug level)
    Verbose,
    /// Maximum output (trace level)
    Trace,
}

impl Verbosity {
    /// Resolve from CLI flags. `--debug` is the compatibility spelling of
    /// `-v`; quiet wins over everything.
    pub fn from_flags(quiet: bool, verbose_count: u8, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else {
            match verbose_count.max(u8::from(debug)) {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }

    /// The tracing filter string for this verbosity level.
    pub fn as_tracing_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

/// Where this node persists its identity keypair: the working directory.
pub fn identity_dir() -> Result<PathBuf, FerryError> {
    std::env::current_dir().map_err(|e| {
        FerryError::Config(format!("could not determine working directory: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(Verbosity::from_flags(true, 3, true), Verbosity::Quiet);
    }

    #[test]
    fn verbosity_ladder() {
        assert_eq!(Verbosity::from_flags(false, 0, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 2, false), Verbosity::Trace);
    }

    #[test]
    fn debug_flag_maps_to_verbose() {
        assert_eq!(Verbosity::from_flags(false, 0, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 2, true), Verbosity::Trace);
    }

    #[test]
    fn filter_strings() {
        assert_eq!(Verbosity::Quiet.as_tracing_filter(), "error");
        assert_eq!(Verbosity::Trace.as_tracing_filter(), "trace");
    }
}
