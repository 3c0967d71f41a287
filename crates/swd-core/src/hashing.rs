//! Shared byte-hashing helper used by both dependency and artifact hashing:
//! delegates to the configured hash binary, mapping empty input to the
//! sentinel rather than ever hashing zero bytes for real.

use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::hash_cache::SENTINEL;

pub fn hash_bytes(data: &[u8], config: &EngineConfig) -> CoreResult<String> {
    if data.is_empty() {
        return Ok(SENTINEL.to_string());
    }
    let out = swd_exec::run_hash_bin(&config.hash_bin, data)?;
    let token = out.split_whitespace().next().unwrap_or("");
    if token.len() != config.hashsum_size {
        return Err(CoreError::InvalidHashBinOutput {
            hash_bin: config.hash_bin.clone(),
            expected: config.hashsum_size,
            got: token.len(),
        });
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        // `/bin/cat` as a stand-in hash binary whose output length we pin
        // to the length of its echoed input.
        EngineConfig {
            bash_bin: "/bin/bash".into(),
            hash_bin: "/bin/cat".into(),
            hashsum_size: 5,
            cache_dir: "/tmp".into(),
        }
    }

    #[test]
    fn empty_input_is_sentinel() {
        let cfg = config();
        assert_eq!(hash_bytes(b"", &cfg).unwrap(), SENTINEL);
    }

    #[test]
    fn non_empty_input_hashes_via_configured_binary() {
        let cfg = config();
        assert_eq!(hash_bytes(b"abcde", &cfg).unwrap(), "abcde");
    }

    #[test]
    fn wrong_length_output_is_fatal() {
        let cfg = config();
        assert!(hash_bytes(b"toolong-input", &cfg).is_err());
    }
}
