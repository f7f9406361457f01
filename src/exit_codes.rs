//! Stable exit codes for git-town CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// A step surfaced a user-facing error (conflict, missing config, etc.).
pub const USER: i32 = 1;
/// Invalid CLI usage; clap exits with this code on its own parse errors.
pub const USAGE: i32 = 2;
