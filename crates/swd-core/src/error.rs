//! Error type for the engine. No `thiserror`: the messages below are part
//! of the contract (tests and end users match on exact text), so they are
//! spelled out by hand rather than generated.

use std::fmt;

#[derive(Debug)]
pub enum CoreError {
    /// `Script::complete_step` was asked to complete a step while an
    /// earlier step in the same script is still incomplete.
    OutOfOrderCompletion { step_path: String },
    /// `FindUnit` consumed its path without locating a matching unit.
    UnknownUnit { path: String },
    /// A dependency or save file referenced an artifact name with no
    /// registered artifact.
    UnknownArtifact { name: String },
    /// `artifacts.json` or `steps.json` violated the persisted schema.
    MalformedCacheData { detail: String },
    /// The configured hash binary produced a digest of the wrong length.
    InvalidHashBinOutput {
        hash_bin: String,
        expected: usize,
        got: usize,
    },
    /// A step's shell command exited with a nonzero status.
    StepFailed { step_path: String },
    /// The process-wide interrupt flag was observed set.
    Interrupted,
    /// More than one of `{showNext, stepCount >= 0, interactive}` was
    /// requested at once.
    ConflictingModes,
    Io(std::io::Error),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfOrderCompletion { step_path } => {
                write!(f, "completing a step out-of-order: '{step_path}'")
            }
            Self::UnknownUnit { path } => write!(f, "unknown unit: {path}"),
            Self::UnknownArtifact { name } => {
                write!(f, "accessing unknown artifact '{name}'")
            }
            Self::MalformedCacheData { detail } => {
                write!(f, "malformed artifact save data: {detail}")
            }
            Self::InvalidHashBinOutput {
                hash_bin,
                expected,
                got,
            } => write!(
                f,
                "configured hash_bin ({hash_bin}) produces invalid hashes: expected {expected} characters, got {got}"
            ),
            Self::StepFailed { step_path } => write!(f, "step '{step_path}' failed"),
            Self::Interrupted => write!(f, "INTERRUPTED"),
            Self::ConflictingModes => {
                write!(f, "at most one of --next, --step, --interactive may be given")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
