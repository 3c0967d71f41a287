//! `.swd.conf` loader: walk up from the current directory until the file is
//! found, chdir into the directory that holds it, and parse its directives
//! into `swd_core::EngineConfig` plus the discovery root.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use swd_core::EngineConfig;

const CONF_NAME: &str = ".swd.conf";

#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub root: PathBuf,
    pub base_path: PathBuf,
}

/// Walk up from the current directory, chdir into wherever `.swd.conf`
/// turns up, and parse it. Fails once the walk reaches `/` without finding
/// one.
pub fn load() -> Result<Config> {
    let base_path = find_conf_dir().context("locating .swd.conf")?;
    std::env::set_current_dir(&base_path)
        .with_context(|| format!("chdir to {}", base_path.display()))?;
    parse(&base_path)
}

fn find_conf_dir() -> Result<PathBuf> {
    let mut dir = std::env::current_dir().context("reading current directory")?;
    loop {
        if dir.join(CONF_NAME).is_file() {
            return Ok(dir);
        }
        if !dir.pop() {
            bail!("No configuration found!");
        }
    }
}

fn parse(base_path: &Path) -> Result<Config> {
    let conf_path = base_path.join(CONF_NAME);
    let text = std::fs::read_to_string(&conf_path)
        .with_context(|| format!("reading {}", conf_path.display()))?;

    let mut engine = EngineConfig::default();
    let mut root: Option<PathBuf> = None;
    let mut path_additions: Vec<String> = Vec::new();

    for raw_line in text.lines() {
        let line = match raw_line.find('#') {
            Some(i) => &raw_line[..i],
            None => raw_line,
        };

        let mut words = line.split_whitespace();
        let Some(directive) = words.next() else {
            continue;
        };

        match directive {
            "add_path" => {
                let Some(add) = words.next() else {
                    bail!("configuration error: invalid 'add_path'");
                };
                path_additions.push(base_path.join(add).to_string_lossy().into_owned());
            }
            "bash_bin" => {
                engine.bash_bin = words
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("configuration error: invalid 'bash_bin'"))?
                    .to_string();
            }
            "cache_dir" => {
                engine.cache_dir = PathBuf::from(
                    words
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("configuration error: invalid 'cache_dir'"))?,
                );
            }
            "env" => {
                // Mirrors `iss >> var >> ws && getline(iss, value)`: the
                // variable is the first token, the value is everything
                // remaining on the line after the whitespace that follows it.
                let rest = line.trim_start();
                let after_directive = rest["env".len()..].trim_start();
                let Some((var, value)) = after_directive.split_once(char::is_whitespace) else {
                    bail!("configuration error: invalid 'env'");
                };
                if var.is_empty() {
                    bail!("configuration error: invalid 'env'");
                }
                std::env::set_var(var, value.trim_start());
            }
            "hash_bin" => {
                engine.hash_bin = words
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("configuration error: invalid 'hash_bin'"))?
                    .to_string();
            }
            "hashsum_size" => {
                let value = words
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("configuration error: invalid 'hashsum_size'"))?;
                engine.hashsum_size = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("configuration error: invalid 'hashsum_size'"))?;
            }
            "root" => {
                let value = words
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("configuration error: invalid 'root'"))?;
                let value = PathBuf::from(value);
                std::env::set_var("SWD_ROOT", &value);
                root = Some(value);
            }
            // Unrecognized directives are silently ignored, matching the
            // original's plain if/else-if chain with no catch-all branch.
            _ => {}
        }
    }

    let root = root.ok_or_else(|| anyhow::anyhow!("configuration error: missing 'root'"))?;

    if !path_additions.is_empty() {
        let joined = path_additions.join(":");
        let new_path = match std::env::var("PATH") {
            Ok(existing) if !existing.is_empty() => format!("{existing}:{joined}"),
            _ => joined,
        };
        std::env::set_var("PATH", new_path);
    }

    Ok(Config {
        engine,
        root,
        base_path: base_path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_conf(dir: &Path, body: &str) {
        std::fs::write(dir.join(CONF_NAME), body).unwrap();
    }

    #[test]
    fn defaults_survive_an_empty_file_but_missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_conf(dir.path(), "");
        let err = parse(dir.path()).unwrap_err();
        assert!(err.to_string().contains("missing 'root'"));
    }

    #[test]
    fn defaults_apply_when_only_root_is_given() {
        let dir = tempfile::tempdir().unwrap();
        write_conf(dir.path(), "root .\n");
        let cfg = parse(dir.path()).unwrap();
        assert_eq!(cfg.engine.bash_bin, "/bin/bash");
        assert_eq!(cfg.engine.hash_bin, "/usr/bin/sha256sum");
        assert_eq!(cfg.engine.hashsum_size, 64);
        assert_eq!(cfg.engine.cache_dir, PathBuf::from(".swd-cache"));
        assert_eq!(cfg.root, PathBuf::from("."));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_conf(
            dir.path(),
            "# a comment\n\nroot .\nhash_bin /usr/bin/md5sum # trailing comment\n",
        );
        let cfg = parse(dir.path()).unwrap();
        assert_eq!(cfg.engine.hash_bin, "/usr/bin/md5sum");
    }

    #[test]
    fn unknown_directive_is_ignored_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_conf(dir.path(), "root .\nsome_future_directive value\n");
        assert!(parse(dir.path()).is_ok());
    }

    #[test]
    fn root_directive_sets_root_and_exports_swd_root() {
        let dir = tempfile::tempdir().unwrap();
        write_conf(dir.path(), "root /tmp/discovery-root\n");
        let cfg = parse(dir.path()).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/tmp/discovery-root"));
        assert_eq!(std::env::var("SWD_ROOT").unwrap(), "/tmp/discovery-root");
    }

    #[test]
    fn env_directive_preserves_the_full_value() {
        let dir = tempfile::tempdir().unwrap();
        write_conf(dir.path(), "root .\nenv SWD_TEST_VAR some value with spaces\n");
        parse(dir.path()).unwrap();
        assert_eq!(
            std::env::var("SWD_TEST_VAR").unwrap(),
            "some value with spaces"
        );
        std::env::remove_var("SWD_TEST_VAR");
    }

    #[test]
    fn missing_value_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_conf(dir.path(), "bash_bin\n");
        assert!(parse(dir.path()).is_err());
    }

    #[test]
    fn add_path_is_joined_to_base_path_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        write_conf(dir.path(), "root .\nadd_path tools/bin\n");
        std::env::set_var("PATH", "/usr/bin");
        parse(dir.path()).unwrap();
        let expected = format!("/usr/bin:{}", dir.path().join("tools/bin").display());
        assert_eq!(std::env::var("PATH").unwrap(), expected);
    }
}
