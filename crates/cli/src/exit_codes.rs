//! CLI Exit Code Registry
//!
//! Single source of truth for `reclink` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                             |
//! |------|-----------------------------------------------------|
//! | 0    | Success                                             |
//! | 1    | General error (unspecified)                         |
//! | 2    | Usage error (bad args, unreadable config file)      |
//! | 3    | Invalid config (parse or validation failure)        |
//! | 4    | Schema error (dataset lacks a configured column)    |
//! | 5    | Runtime / IO error (load, export, candidate cap)    |
//! | 6    | Partial failure (only with `--fail-on-partial`)     |

use reclink_linkage::LinkageError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing config file.
pub const EXIT_USAGE: u8 = 2;

/// Config could not be parsed or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// A dataset is missing a column the config refers to.
pub const EXIT_SCHEMA: u8 = 4;

/// Load, export or engine failure at runtime.
pub const EXIT_RUNTIME: u8 = 5;

/// Some comparisons failed while others succeeded.
pub const EXIT_PARTIAL: u8 = 6;

/// Map an engine error to its exit code. Pair-job failures use their cause.
pub fn linkage_exit_code(err: &LinkageError) -> u8 {
    match err {
        LinkageError::ConfigParse(_) | LinkageError::Configuration(_) => EXIT_INVALID_CONFIG,
        LinkageError::Schema { .. } => EXIT_SCHEMA,
        LinkageError::PairJob { source, .. } => linkage_exit_code(source),
        LinkageError::State(_) => EXIT_ERROR,
        LinkageError::CandidateLimit { .. } | LinkageError::Io(_) => EXIT_RUNTIME,
    }
}
