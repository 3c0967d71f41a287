//! Ties the unit tree to the artifact registry. Everything in `unit.rs` and
//! `artifact.rs` is self-contained; the staleness check and the rebuild
//! fallout it can trigger need both at once, which is what `Master` is for.

use std::collections::BTreeMap;

use crate::artifact::Artifact;
use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::signal::{EngineResult, EngineSignal};
use crate::unit::{Node, NodeId, Tree};

pub struct Master {
    pub tree: Tree,
    pub artifacts: BTreeMap<String, Artifact>,
    pub config: EngineConfig,
}

impl Master {
    pub fn new(root_name: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            tree: Tree::new(root_name),
            artifacts: BTreeMap::new(),
            config,
        }
    }

    pub fn artifact(&self, name: &str) -> CoreResult<&Artifact> {
        self.artifacts
            .get(name)
            .ok_or_else(|| CoreError::UnknownArtifact {
                name: name.to_string(),
            })
    }

    pub fn artifact_mut(&mut self, name: &str) -> CoreResult<&mut Artifact> {
        self.artifacts
            .get_mut(name)
            .ok_or_else(|| CoreError::UnknownArtifact {
                name: name.to_string(),
            })
    }

    /// §4.5 `everythingUpToDate`. May return `InvalidateScope` (propagated
    /// from the artifact's mark check or from a rebuild it triggers), in
    /// which case the caller (the Group/Script scope handler) restarts its
    /// children loop.
    pub fn everything_up_to_date(&mut self, step: NodeId) -> EngineResult<bool> {
        let step_path = self.tree.canonical_path(step);
        let (always, links, dep_count) = match self.tree.node(step) {
            Node::Step(s) => (s.flags.always, s.artifacts.clone(), s.dependencies.len()),
            _ => panic!("not a step"),
        };

        let mut up_to_date = if always { false } else { self.tree.is_completed(step) };

        if up_to_date {
            for i in 0..dep_count {
                let ok = match self.tree.node(step) {
                    Node::Step(s) => s.dependencies[i].is_up_to_date(&self.artifacts, &self.config)?,
                    _ => panic!("not a step"),
                };
                if !ok {
                    up_to_date = false;
                    break;
                }
            }
        }

        for (name, link_type) in &links {
            let check = self.artifact(name)?.manager().check_mark(&step_path, *link_type);
            for undo_path in &check.to_undo {
                if let Ok(id) = self.tree.find_unit(undo_path) {
                    self.tree.undo_step(id);
                }
            }
            if check.raise_scope {
                let scope = self.artifact(name)?.scope.clone();
                return Err(EngineSignal::InvalidateScope(scope));
            }

            let current = self.artifact(name)?.calculate_hash(&self.config)?;
            let fresh = self.artifact(name)?.hash_cache().compare(&current, true);
            if !fresh {
                up_to_date = false;
                let undone = self.rebuild_artifact(name)?;
                if undone > 0 {
                    let scope = self.artifact(name)?.scope.clone();
                    return Err(EngineSignal::InvalidateScope(scope));
                }
            }
        }

        Ok(up_to_date)
    }

    /// §4.5 `recalculateHashes`. Stores every linked artifact's current hash
    /// and completes its mark, then stores every dependency's current hash.
    pub fn recalculate_hashes(&mut self, step: NodeId) -> CoreResult<()> {
        let step_path = self.tree.canonical_path(step);
        let links = match self.tree.node(step) {
            Node::Step(s) => s.artifacts.clone(),
            _ => panic!("not a step"),
        };
        let config = self.config.clone();

        for (name, link_type) in &links {
            let artifact = self.artifact_mut(name)?;
            artifact.recalculate_hash(&config)?;
            artifact.manager_mut().complete_step(&step_path, *link_type);
        }

        match self.tree.node_mut(step) {
            Node::Step(s) => {
                for dep in s.dependencies.iter_mut() {
                    dep.store_current_hash(&self.artifacts, &self.config)?;
                }
            }
            _ => panic!("not a step"),
        }

        Ok(())
    }

    /// §4.3 `rebuildArtifact`: scan the whole tree and undo every completed
    /// step that links `name` under any link type. Returns the number of
    /// steps undone.
    pub fn rebuild_artifact(&mut self, name: &str) -> CoreResult<usize> {
        self.artifact(name)?; // validates existence
        let mut undone = 0;
        for step in self.tree.all_steps_under(self.tree.root()) {
            let links_artifact = match self.tree.node(step) {
                Node::Step(s) => s.artifacts.iter().any(|(n, _)| n == name),
                _ => false,
            };
            if links_artifact && self.tree.is_completed(step) {
                self.tree.undo_step(step);
                undone += 1;
            }
        }
        Ok(undone)
    }

    /// `undo(path)` dispatch: Group recurses into every child, Script clears
    /// all its steps, Step clears itself and its successors.
    pub fn undo_unit(&mut self, unit: NodeId) {
        match self.tree.node(unit) {
            Node::Group(g) => {
                for child in g.children.clone() {
                    self.undo_unit(child);
                }
            }
            Node::Script(_) => self.tree.undo_all(unit),
            Node::Step(_) => self.tree.undo_step(unit),
        }
    }

    /// `--rehash=<artifact>`: recompute and unconditionally store the
    /// artifact's hash, returning the (old, new) pair for diagnostics.
    pub fn rehash_artifact(&mut self, name: &str) -> CoreResult<(String, String)> {
        let old = self.artifact(name)?.hash_cache().get_hash().to_string();
        let config = self.config.clone();
        let new = self.artifact_mut(name)?.recalculate_hash(&config)?;
        Ok((old, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Artifact, ArtifactKind, LinkType};
    use crate::unit::StepFlags;
    use std::path::PathBuf;

    fn config() -> EngineConfig {
        EngineConfig {
            bash_bin: "/bin/bash".into(),
            hash_bin: "/bin/cat".into(),
            hashsum_size: 5,
            cache_dir: "/tmp".into(),
        }
    }

    fn master_with_file_artifact(path: PathBuf) -> (Master, NodeId) {
        let mut m = Master::new("root", config());
        let root = m.tree.root();
        let script = m.tree.add_script(root, "10-a");
        let step = m.tree.add_step(
            script,
            "s1",
            vec![("out".to_string(), LinkType::Simple)],
            vec![],
            StepFlags::default(),
        );
        m.artifacts.insert(
            "out".to_string(),
            Artifact::new("out".into(), "10-a".into(), ArtifactKind::File { path }),
        );
        (m, step)
    }

    #[test]
    fn fresh_step_is_never_up_to_date() {
        let (mut m, step) = master_with_file_artifact(PathBuf::from("/no/such/file"));
        assert!(!m.everything_up_to_date(step).unwrap());
    }

    #[test]
    fn after_recalculate_and_complete_step_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");
        std::fs::write(&file, b"hello").unwrap();
        let (mut m, step) = master_with_file_artifact(file);
        m.recalculate_hashes(step).unwrap();
        m.tree.complete_step(step).unwrap();
        assert!(m.everything_up_to_date(step).unwrap());
    }

    #[test]
    fn rebuild_undoes_every_step_linking_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.txt");
        std::fs::write(&file, b"hello").unwrap();
        let (mut m, step) = master_with_file_artifact(file.clone());
        m.recalculate_hashes(step).unwrap();
        m.tree.complete_step(step).unwrap();

        std::fs::write(&file, b"changed").unwrap();
        let undone = m.rebuild_artifact("out").unwrap();
        assert_eq!(undone, 1);
        assert!(!m.tree.is_completed(step));
    }

    #[test]
    fn always_flagged_step_is_never_up_to_date() {
        let mut m = Master::new("root", config());
        let root = m.tree.root();
        let script = m.tree.add_script(root, "10-a");
        let step = m.tree.add_step(
            script,
            "s1",
            vec![],
            vec![],
            StepFlags {
                always: true,
                sudo: false,
            },
        );
        m.tree.complete_step(step).unwrap();
        assert!(!m.everything_up_to_date(step).unwrap());
    }

    #[test]
    fn undo_unit_on_group_recurses_into_scripts() {
        let mut m = Master::new("root", config());
        let root = m.tree.root();
        let group = m.tree.add_group(root, "10-group");
        let script = m.tree.add_script(group, "20-b");
        let s1 = m.tree.add_step(script, "s1", vec![], vec![], StepFlags::default());
        m.tree.complete_step(s1).unwrap();
        m.undo_unit(group);
        assert!(!m.tree.is_completed(s1));
    }
}
