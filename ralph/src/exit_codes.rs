//! Stable exit codes for ralph CLI commands.

/// Command succeeded or an open story was selected.
pub const OK: i32 = 0;
/// Command failed due to a missing/invalid plan or other errors.
pub const INVALID: i32 = 1;
/// `ralph select` found no open story (plan complete).
pub const COMPLETE: i32 = 2;
/// `ralph loop` stopped at the iteration cap with stories still open.
pub const ABORTED: i32 = 3;
