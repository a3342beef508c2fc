//! Exit codes following sysexits.h conventions.
//!
//! These codes give scripts and CI systems semantic failure modes to
//! branch on, most importantly "the image did not verify" versus "the
//! tool could not run".

#![allow(dead_code)] // Constants kept for documentation completeness

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (verification failed, tampered or missing proof).
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Exit code classified from a failed command.
pub struct ExitCode {
    pub code: i32,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by inspecting the rendered chain.
        let code = if message.contains("Failed to read") {
            INPUT_ERROR
        } else if message.contains("verification failed") {
            VERIFICATION_FAILED
        } else if message.contains("Failed to write") {
            IO_ERROR
        } else {
            GENERAL_ERROR
        };

        Self { code }
    }
}
