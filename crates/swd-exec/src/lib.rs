//! Process plumbing, bash escaping and terminal color constants.
//!
//! `swd-core` never calls `std::process::Command` or touches a terminal
//! directly; everything that crosses the OS boundary for step execution and
//! hashing lives here, behind small, narrow functions.

pub mod ansi;
pub mod bash;
pub mod fs;
pub mod process;

pub use ansi::{BOLD, BOLD_BLACK, BOLD_GREEN, BOLD_RED, RESET};
pub use bash::escape_bash;
pub use fs::ensure_dir;
pub use process::{RunOutcome, run_hash_bin, run_via_shell};
