//! Library half of the `swd` binary: `.swd.conf` loading, filesystem
//! discovery, `swd_info` probing, SIGINT wiring, and list-rendering. Split
//! out from `main.rs` so it can be driven end-to-end from integration
//! tests without going through argument parsing or process exit codes.

pub mod config;
pub mod info;
pub mod output;
pub mod scan;
pub mod signal;
