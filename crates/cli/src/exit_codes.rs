//! CLI Exit Code Registry
//!
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Range   | Domain     | Description                              |
//! |---------|------------|------------------------------------------|
//! | 0       | Universal  | Success                                  |
//! | 1       | Universal  | General error (unspecified)              |
//! | 2       | Universal  | CLI usage error (bad args)               |
//! | 3       | Universal  | File read/write failure                  |
//! | 10-19   | ai         | AI provider/keychain codes               |
//! | 20-29   | pipeline   | Intake, extraction and export codes      |

// =============================================================================
// Universal (0-3)
// =============================================================================

pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, mismatched `--cycle` labels.
pub const EXIT_USAGE: u8 = 2;

/// A document, replay file or output path could not be read or written.
pub const EXIT_IO: u8 = 3;

// =============================================================================
// AI (10-19)
// =============================================================================

/// AI disabled (provider=none) and no `--replay` given.
pub const EXIT_AI_DISABLED: u8 = 10;

/// AI provider configured but API key missing.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

// =============================================================================
// Pipeline (20-29)
// =============================================================================

/// Documents failed intake checks (count, size, format, cycle label).
pub const EXIT_INPUT_REJECTED: u8 = 20;

/// The extraction service failed or returned malformed records.
pub const EXIT_EXTRACTION_FAILED: u8 = 21;

/// The workbook could not be built.
pub const EXIT_SYNTHESIS_FAILED: u8 = 22;

/// The file given to `inspect` is not a readable workbook.
pub const EXIT_WORKBOOK_UNREADABLE: u8 = 23;
