//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `cryo` exit codes.
//! Scripts driving the inventory rely on them.
//!
//! # Exit Codes
//!
//! | Code | Domain     | Description                                        |
//! |------|------------|----------------------------------------------------|
//! | 0    | Universal  | Success                                            |
//! | 1    | Universal  | General error (unspecified)                        |
//! | 2    | Universal  | CLI usage error (bad args, unparseable value)      |
//! | 3    | Storage    | Database, file or export failure                   |
//! | 4    | Input      | Form validation or grid geometry rejected          |
//! | 5    | Lookup     | Box, cell, container or reservation does not exist |
//! | 6    | Lifecycle  | Status change not allowed from the current state   |
//! | 7    | Internal   | Invariant violation (slot outside its own grid)    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant below
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in `main.rs` (`impl From<RepoError> for CliError`)

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown tab/type/status value, bad date.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Inventory (3-7)
// =============================================================================

/// The database could not be opened or written, or an import/export file
/// could not be read or written.
pub const EXIT_IO: u8 = 3;

/// A form failed validation, or the requested grid geometry is invalid
/// (zero rows or columns).
pub const EXIT_VALIDATION: u8 = 4;

/// The addressed box, slot, rack, tank or reservation does not exist.
/// Also returned for coordinates outside the box.
pub const EXIT_NOT_FOUND: u8 = 5;

/// The cell or reservation is not in a state that allows the change
/// (filling a full slot, releasing a slot that is not reserved, reopening
/// a completed reservation).
pub const EXIT_INVALID_TRANSITION: u8 = 6;

/// A position that must exist by construction could not be resolved.
/// Indicates a bug, not bad input.
pub const EXIT_INVARIANT: u8 = 7;
