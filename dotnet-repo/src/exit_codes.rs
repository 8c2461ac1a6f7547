//! Stable exit codes for the `dotnet-repo` CLI.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed: missing tool, unknown version control system, existing
/// target directory, a failed external command, or any other error.
pub const FAILURE: i32 = 1;
