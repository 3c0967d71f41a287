//! Logging initialization, in the padded-label / ANSI-on-TTY style used
//! throughout the rest of the stack.

use std::io::{IsTerminal, Write};

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Initialize `env_logger` with the given default filter (overridden by
/// `RUST_LOG` if set), colorized only when stderr is a TTY.
pub fn init_logging(default_filter: &str) {
    let color = std::io::stderr().is_terminal();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(move |buf, record| {
            let (pre, label, post) = level_style(record.level(), color);
            writeln!(buf, "[{pre}{label}{post}] {}", record.args())
        })
        .init();
}
