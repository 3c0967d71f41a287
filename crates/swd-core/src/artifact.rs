//! Artifact kinds (`File`, `Directory`) and the per-artifact `Manager` mark
//! state machine.

use std::collections::BTreeMap;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::config::EngineConfig;
use crate::error::CoreResult;
use crate::hash_cache::{HashCache, SENTINEL};
use crate::hashing::hash_bytes;

#[derive(Debug, Clone)]
pub enum ArtifactKind {
    File { path: PathBuf },
    Directory { path: PathBuf, exclude: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LinkType {
    Simple,
    Aggregate,
    Post,
}

impl LinkType {
    /// `"simple"`/`""` both round-trip to `Simple` but only `"aggregate"`
    /// and `"post"` are ever emitted by `to_string`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "simple" => Some(Self::Simple),
            "aggregate" => Some(Self::Aggregate),
            "post" => Some(Self::Post),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "",
            Self::Aggregate => "aggregate",
            Self::Post => "post",
        }
    }
}

/// Tracks, per artifact, which steps contributed under which link type.
/// `Simple` marks are never recorded — they are the "no mark" value.
#[derive(Debug, Default, Clone)]
pub struct Manager {
    marks: BTreeMap<String, LinkType>,
}

/// Result of checking a step's mark against the artifact's mark table.
pub struct MarkCheck {
    /// Step paths whose completion must be undone.
    pub to_undo: Vec<String>,
    /// Whether an `InvalidateScope` must be raised immediately (the "same
    /// step retries" case).
    pub raise_scope: bool,
}

impl Manager {
    pub fn marks(&self) -> &BTreeMap<String, LinkType> {
        &self.marks
    }

    pub fn restore_mark(&mut self, step_path: impl Into<String>, link_type: LinkType) {
        if link_type != LinkType::Simple {
            self.marks.insert(step_path.into(), link_type);
        }
    }

    pub fn complete_step(&mut self, step_path: &str, link_type: LinkType) {
        if link_type == LinkType::Simple {
            return;
        }
        self.marks.insert(step_path.to_string(), link_type);
    }

    /// `Aggregate` and `Post` are treated identically: a step seen again
    /// under the same link type it was already marked with invalidates
    /// every `Aggregate`/`Post` mark and demands a scope restart; otherwise
    /// only `Post` marks are invalidated (they must re-run after any new
    /// contribution).
    pub fn check_mark(&self, step_path: &str, link_type: LinkType) -> MarkCheck {
        if link_type == LinkType::Simple {
            return MarkCheck {
                to_undo: Vec::new(),
                raise_scope: false,
            };
        }
        let already_marked_same = self.marks.get(step_path) == Some(&link_type);
        if already_marked_same {
            let to_undo = self
                .marks
                .iter()
                .filter(|(_, t)| matches!(t, LinkType::Aggregate | LinkType::Post))
                .map(|(s, _)| s.clone())
                .collect();
            MarkCheck {
                to_undo,
                raise_scope: true,
            }
        } else {
            let to_undo = self
                .marks
                .iter()
                .filter(|(_, t)| **t == LinkType::Post)
                .map(|(s, _)| s.clone())
                .collect();
            MarkCheck {
                to_undo,
                raise_scope: false,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub scope: String,
    pub kind: ArtifactKind,
    hash_cache: HashCache,
    manager: Manager,
}

impl Artifact {
    pub fn new(name: String, scope: String, kind: ArtifactKind) -> Self {
        Self {
            name,
            scope,
            kind,
            hash_cache: HashCache::new(),
            manager: Manager::default(),
        }
    }

    pub fn hash_cache(&self) -> &HashCache {
        &self.hash_cache
    }

    pub fn hash_cache_mut(&mut self) -> &mut HashCache {
        &mut self.hash_cache
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut Manager {
        &mut self.manager
    }

    pub fn calculate_hash(&self, config: &EngineConfig) -> CoreResult<String> {
        match &self.kind {
            ArtifactKind::File { path } => match std::fs::read(path) {
                Ok(bytes) => hash_bytes(&bytes, config),
                Err(_) => Ok(SENTINEL.to_string()),
            },
            ArtifactKind::Directory { path, exclude } => {
                directory_hash(path, exclude, config)
            }
        }
    }

    /// Recompute, store, and return the artifact's current hash.
    pub fn recalculate_hash(&mut self, config: &EngineConfig) -> CoreResult<String> {
        let hash = self.calculate_hash(config)?;
        self.hash_cache.store_hash(hash.clone());
        Ok(hash)
    }
}

fn is_excluded(rel_path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pat| {
        glob::Pattern::new(pat)
            .map(|p| p.matches(rel_path))
            .unwrap_or(false)
    })
}

fn directory_hash(path: &PathBuf, exclude: &[String], config: &EngineConfig) -> CoreResult<String> {
    if std::fs::read_dir(path).is_err() {
        return Ok(SENTINEL.to_string());
    }

    let mut lines = Vec::new();
    let walker = WalkDir::new(path).into_iter().filter_entry(|entry| {
        let rel = entry
            .path()
            .strip_prefix(path)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        rel.is_empty() || !is_excluded(&rel, exclude)
    });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| crate::error::CoreError::Io(e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(path)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        lines.push(format!("{}\t{}\t{}", meta.size(), meta.mtime(), rel));
    }
    lines.sort();

    hash_bytes(lines.join("\n").as_bytes(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config() -> EngineConfig {
        EngineConfig {
            bash_bin: "/bin/bash".into(),
            hash_bin: "/bin/cat".into(),
            hashsum_size: 5,
            cache_dir: "/tmp".into(),
        }
    }

    #[test]
    fn link_type_round_trips() {
        assert_eq!(LinkType::parse(""), Some(LinkType::Simple));
        assert_eq!(LinkType::parse("simple"), Some(LinkType::Simple));
        assert_eq!(LinkType::parse("aggregate"), Some(LinkType::Aggregate));
        assert_eq!(LinkType::parse("post"), Some(LinkType::Post));
        assert_eq!(LinkType::parse("bogus"), None);
        assert_eq!(LinkType::Aggregate.as_str(), "aggregate");
        assert_eq!(LinkType::Simple.as_str(), "");
    }

    #[test]
    fn manager_never_records_simple_marks() {
        let mut m = Manager::default();
        m.complete_step("10-a s1", LinkType::Simple);
        assert!(m.marks().is_empty());
    }

    #[test]
    fn manager_aggregate_retry_invalidates_aggregate_and_post() {
        let mut m = Manager::default();
        m.complete_step("10-a s1", LinkType::Aggregate);
        m.complete_step("20-b p", LinkType::Post);
        let check = m.check_mark("10-a s1", LinkType::Aggregate);
        assert!(check.raise_scope);
        assert_eq!(check.to_undo.len(), 2);
    }

    #[test]
    fn manager_new_aggregate_step_invalidates_only_post() {
        let mut m = Manager::default();
        m.complete_step("20-b p", LinkType::Post);
        let check = m.check_mark("10-a s1", LinkType::Aggregate);
        assert!(!check.raise_scope);
        assert_eq!(check.to_undo, vec!["20-b p".to_string()]);
    }

    #[test]
    fn file_artifact_missing_is_sentinel() {
        let art = Artifact::new(
            "out".into(),
            "root".into(),
            ArtifactKind::File {
                path: PathBuf::from("/no/such/file"),
            },
        );
        assert_eq!(art.calculate_hash(&config()).unwrap(), SENTINEL);
    }

    #[test]
    fn directory_artifact_missing_permission_denied_path_is_sentinel() {
        let art = Artifact::new(
            "outdir".into(),
            "root".into(),
            ArtifactKind::Directory {
                path: PathBuf::from("/no/such/dir"),
                exclude: vec![],
            },
        );
        assert_eq!(art.calculate_hash(&config()).unwrap(), SENTINEL);
    }

    #[test]
    fn directory_artifact_hashes_deterministically() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"world").unwrap();
        let art = Artifact::new(
            "outdir".into(),
            "root".into(),
            ArtifactKind::Directory {
                path: dir.path().to_path_buf(),
                exclude: vec![],
            },
        );
        let h1 = art.calculate_hash(&config()).unwrap();
        let h2 = art.calculate_hash(&config()).unwrap();
        assert_eq!(h1, h2);
        assert_ne!(h1, SENTINEL);
    }

    #[test]
    fn directory_artifact_respects_exclude_patterns() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"hello").unwrap();
        let art_without_skip = Artifact::new(
            "outdir".into(),
            "root".into(),
            ArtifactKind::Directory {
                path: dir.path().to_path_buf(),
                exclude: vec![],
            },
        );
        let baseline = art_without_skip.calculate_hash(&config()).unwrap();

        std::fs::write(dir.path().join("skip.tmp"), b"ignored").unwrap();
        let art_with_exclude = Artifact::new(
            "outdir".into(),
            "root".into(),
            ArtifactKind::Directory {
                path: dir.path().to_path_buf(),
                exclude: vec!["*.tmp".to_string()],
            },
        );
        let with_exclude = art_with_exclude.calculate_hash(&config()).unwrap();
        assert_eq!(baseline, with_exclude);
    }
}
