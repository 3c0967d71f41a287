//! Process-wide interrupt flag.
//!
//! The engine treats this as an opaque input: something outside the core
//! (a SIGINT handler installed by `swd-cli`) sets it, and the executor
//! checks it before launching a child process and after waiting on one.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global interrupt flag, set by a signal handler.
pub fn interrupt_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

pub fn is_interrupted() -> bool {
    interrupt_flag().load(Ordering::Relaxed)
}

/// Request interruption (called from a signal handler).
pub fn request_interrupt() {
    interrupt_flag().store(true, Ordering::Relaxed);
}
