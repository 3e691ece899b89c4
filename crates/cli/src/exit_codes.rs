//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scheduled jobs rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error                                             |
//! | 2    | Usage or config error (bad args, invalid engine config)   |
//! | 3    | Store cannot be opened                                    |
//! | 4    | Run finished with recorded issues (only with `--strict`)  |

use casework_dedup::DedupError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable or invalid config.
pub const EXIT_USAGE: u8 = 2;

/// The store file is missing or cannot be opened.
pub const EXIT_STORE_OPEN: u8 = 3;

/// The run completed but recorded per-operation failures.
/// Without `--strict` such a run exits 0; re-running retries the failed work.
pub const EXIT_RUN_ISSUES: u8 = 4;

/// Map an engine error to its exit code.
pub fn dedup_exit_code(err: &DedupError) -> u8 {
    match err {
        DedupError::ConfigParse(_) | DedupError::ConfigValidation(_) | DedupError::Io(_) => EXIT_USAGE,
        DedupError::Store(_) => EXIT_ERROR,
    }
}
