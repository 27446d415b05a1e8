//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Usage error - invalid arguments, overrides or repository coordinates
/// (same code clap uses for argument errors)
pub const USAGE_ERROR: i32 = 2;

/// Repository error - registration, index refresh or download failed
pub const REPOSITORY_ERROR: i32 = 3;

/// Chart error - chart missing, not installable, bad values or dependencies
pub const CHART_ERROR: i32 = 4;

/// Template error - rendering failed
pub const TEMPLATE_ERROR: i32 = 5;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 6;

/// Temporary failure - the repository file lock could not be acquired
/// (EX_TEMPFAIL)
pub const LOCK_TIMEOUT: i32 = 75;
