//! Process exit codes for monitoring systems.
//!
//! Codes follow Unix conventions so wrapper scripts and schedulers can
//! react to the outcome class without parsing output. A run that touched
//! the network maps through [`ExitCode::from_run`]; failures before any
//! source started (bad configuration, I/O at startup) map through
//! [`ExitCode::for_error`].

use smg_core::{ErrorClass, RunResult};

use crate::error::CliError;

/// Exit codes reported by the `smg` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every source completed without errors
    Success = 0,

    /// Unclassified failure
    General = 1,

    /// Configuration failed to load or validate
    Config = 2,

    /// Complete failure where every recorded error was a connection error
    Connection = 3,

    /// Complete failure with mixed or local causes
    Processing = 4,

    /// A shutdown signal stopped the run
    Interrupted = 6,

    /// Some sources succeeded, some failed
    Partial = 7,
}

impl ExitCode {
    /// Numeric code passed to `process::exit`
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map a finished run to its exit code.
    ///
    /// Interruption wins over everything else: a cancelled run reports
    /// `Interrupted` even when some sources had already finished cleanly.
    pub fn from_run(run: &RunResult) -> Self {
        if run.was_interrupted() {
            return ExitCode::Interrupted;
        }

        let rate = run.success_rate();
        if rate >= 1.0 {
            return ExitCode::Success;
        }
        if rate > 0.0 {
            return ExitCode::Partial;
        }

        // Complete failure. An unreachable store fleet gets its own code
        // so monitoring can tell it apart from bad data or full disks.
        let connection_only = run
            .sources
            .iter()
            .flat_map(|s| s.errors.iter())
            .all(|e| e.class == ErrorClass::Connection);
        if connection_only {
            ExitCode::Connection
        } else {
            ExitCode::Processing
        }
    }

    /// Map a command-level error to its exit code
    pub fn for_error(err: &CliError) -> Self {
        match err {
            CliError::Config(_) => ExitCode::Config,
            CliError::Io(_) | CliError::Other(_) => ExitCode::General,
        }
    }
}
