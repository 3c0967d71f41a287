//! The engine-facing slice of configuration, threaded explicitly through
//! every function that needs it rather than read from a global singleton.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bash_bin: String,
    pub hash_bin: String,
    pub hashsum_size: usize,
    pub cache_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bash_bin: "/bin/bash".to_string(),
            hash_bin: "/usr/bin/sha256sum".to_string(),
            hashsum_size: 64,
            cache_dir: PathBuf::from(".swd-cache"),
        }
    }
}
