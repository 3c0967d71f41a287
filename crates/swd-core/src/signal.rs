//! The control-flow signal that replaces the source's
//! `throw invalidate_scope(scope)`. Rather than a literal exception, it is
//! a distinguished `Err` variant threaded up the call stack: each Group or
//! Script frame compares the carried scope path to its own canonical path
//! and either restarts its children traversal or lets the signal propagate.

use crate::error::CoreError;

#[derive(Debug)]
pub enum EngineSignal {
    /// An ordinary fatal error — not a control-flow signal.
    Fatal(CoreError),
    /// The scope (a Group's or Script's canonical path) that must restart
    /// its children traversal from the beginning.
    InvalidateScope(String),
}

impl From<CoreError> for EngineSignal {
    fn from(e: CoreError) -> Self {
        Self::Fatal(e)
    }
}

pub type EngineResult<T> = Result<T, EngineSignal>;
