//! `--list-steps` / `--list-artifacts` rendering (§6 Supplemental Features):
//! plain column output, artifacts get a colorized status column on a TTY.

use std::io::IsTerminal;

use swd_core::{engine, Artifact, EngineConfig, Master, SENTINEL};

use swd_exec::{BOLD_BLACK, BOLD_GREEN, BOLD_RED, RESET};

pub fn list_steps(master: &Master) {
    let root = master.tree.root();
    for (step, path) in engine::list_step_paths(&master.tree, root) {
        let mark = if master.tree.is_completed(step) { 'x' } else { ' ' };
        println!("[{mark}] {path}");
    }
}

/// Status label and ANSI color for an artifact's current staleness.
fn classify(artifact: &Artifact, config: &EngineConfig) -> anyhow::Result<(&'static str, &'static str)> {
    let current = artifact.calculate_hash(config)?;
    Ok(if current == SENTINEL {
        ("does not exist", BOLD_BLACK)
    } else if artifact.hash_cache().compare(&current, true) {
        ("up to date", BOLD_GREEN)
    } else {
        ("dirty", BOLD_RED)
    })
}

pub fn list_artifacts(master: &Master) -> anyhow::Result<()> {
    let color = std::io::stdout().is_terminal();
    for (name, artifact) in &master.artifacts {
        let (label, code) = classify(artifact, &master.config)?;
        if color {
            println!("{name:<40} {code}{label}{RESET}");
        } else {
            println!("{name:<40} {label}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use swd_core::ArtifactKind;
    use std::path::PathBuf;

    fn config() -> EngineConfig {
        EngineConfig {
            bash_bin: "/bin/bash".into(),
            hash_bin: "/bin/cat".into(),
            hashsum_size: 5,
            cache_dir: "/tmp".into(),
        }
    }

    #[test]
    fn missing_file_artifact_classifies_as_does_not_exist() {
        let art = Artifact::new(
            "out".into(),
            "root".into(),
            ArtifactKind::File { path: PathBuf::from("/no/such/file") },
        );
        let (label, _) = classify(&art, &config()).unwrap();
        assert_eq!(label, "does not exist");
    }

    #[test]
    fn matching_stored_hash_classifies_as_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");
        std::fs::write(&file, b"hello").unwrap();
        let mut art = Artifact::new("out".into(), "root".into(), ArtifactKind::File { path: file });
        art.recalculate_hash(&config()).unwrap();
        let (label, _) = classify(&art, &config()).unwrap();
        assert_eq!(label, "up to date");
    }

    #[test]
    fn stale_stored_hash_classifies_as_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");
        std::fs::write(&file, b"hello").unwrap();
        let mut art = Artifact::new("out".into(), "root".into(), ArtifactKind::File { path: file.clone() });
        art.recalculate_hash(&config()).unwrap();
        std::fs::write(&file, b"changed").unwrap();
        let (label, _) = classify(&art, &config()).unwrap();
        assert_eq!(label, "dirty");
    }
}
