//! ANSI escape constants used by step/artifact listing output.

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const BLACK: &str = "\x1b[30m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";
pub const WHITE: &str = "\x1b[37m";

/// Bold + black, used for "does not exist" artifact status.
pub const BOLD_BLACK: &str = "\x1b[1m\x1b[30m";
/// Bold + green, used for "up to date" artifact status.
pub const BOLD_GREEN: &str = "\x1b[1m\x1b[32m";
/// Bold + red, used for "dirty" artifact status.
pub const BOLD_RED: &str = "\x1b[1m\x1b[31m";
