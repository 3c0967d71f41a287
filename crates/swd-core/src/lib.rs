//! swd-core - the dependency evaluation and scope-invalidation engine
//!
//! The Group / Script / Step tree, hash cache, dependency/artifact model,
//! and the scoped executor that walks them. No process spawning, no CLI
//! parsing, no direct filesystem scanning — those live in `swd-exec` and
//! `swd-cli`.

pub mod artifact;
pub mod cache;
pub mod config;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod execute;
pub mod hash_cache;
pub mod hashing;
pub mod interrupt;
pub mod logging;
pub mod master;
pub mod signal;
pub mod unit;

pub use artifact::{Artifact, ArtifactKind, LinkType, Manager, MarkCheck};
pub use config::EngineConfig;
pub use dependency::{Dependency, DependencyKind};
pub use error::{CoreError, CoreResult};
pub use execute::{ExecuteOptions, Executor};
pub use hash_cache::{HashCache, SENTINEL};
pub use interrupt::{interrupt_flag, is_interrupted, request_interrupt};
pub use logging::init_logging;
pub use master::Master;
pub use signal::{EngineResult, EngineSignal};
pub use unit::{GroupData, Node, NodeId, ScriptData, StepData, StepFlags, Tree};
