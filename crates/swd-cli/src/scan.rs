//! Filesystem discovery (§6): walks the tree root building the Group/Script
//! skeleton. Steps, artifacts, and dependencies are filled in afterward by
//! `info::populate`, which invokes each unit's `swd_info` probe.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

use swd_core::{NodeId, Tree};

const SCRIPT_EXT: &str = ".swd";

fn script_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]([0-9][a-z]?)?-[a-zA-Z][a-zA-Z0-9_-]*\.swd$").unwrap())
}

fn group_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]([0-9][a-z]?)?-[a-zA-Z][a-zA-Z0-9_-]*$").unwrap())
}

fn is_owner_executable(path: &Path) -> std::io::Result<bool> {
    let meta = std::fs::metadata(path)?;
    Ok(meta.permissions().mode() & 0o100 != 0)
}

/// Build the Group/Script skeleton rooted at `root_path`. The caller is
/// expected to already have the process cwd set to `root_path` (or an
/// ancestor irrelevant to relative exec paths), since `Tree::exec_path`
/// produces paths relative to this root.
pub fn scan(root_path: &Path) -> Result<Tree> {
    let root_name = root_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    let mut tree = Tree::new(root_name);
    let root = tree.root();
    scan_dir(&mut tree, root, root_path)?;
    Ok(tree)
}

fn scan_dir(tree: &mut Tree, parent: NodeId, dir: &Path) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("reading directory {}", dir.display()))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;

        if file_type.is_dir() {
            if group_name_re().is_match(&name) {
                let group = tree.add_group(parent, name);
                scan_dir(tree, group, &path)?;
            }
        } else if file_type.is_file()
            && script_name_re().is_match(&name)
            && is_owner_executable(&path)?
        {
            let script_name = name.strip_suffix(SCRIPT_EXT).expect("regex matched .swd suffix");
            tree.add_script(parent, script_name.to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use swd_core::Node;

    fn make_executable(path: &Path) {
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn discovers_top_level_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("10-build.swd");
        fs::write(&script, "#!/bin/bash\n").unwrap();
        make_executable(&script);

        let tree = scan(dir.path()).unwrap();
        let root = tree.root();
        assert_eq!(tree.group_children(root).len(), 1);
        let child = tree.group_children(root)[0];
        assert_eq!(tree.name(child), "10-build");
        assert!(matches!(tree.node(child), Node::Script(_)));
    }

    #[test]
    fn skips_non_executable_scripts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("10-build.swd"), "#!/bin/bash\n").unwrap();

        let tree = scan(dir.path()).unwrap();
        assert!(tree.group_children(tree.root()).is_empty());
    }

    #[test]
    fn skips_dotfiles_and_malformed_names() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = dir.path().join(".10-build.swd");
        fs::write(&hidden, "#!/bin/bash\n").unwrap();
        make_executable(&hidden);
        let bad_name = dir.path().join("build.swd");
        fs::write(&bad_name, "#!/bin/bash\n").unwrap();
        make_executable(&bad_name);

        let tree = scan(dir.path()).unwrap();
        assert!(tree.group_children(tree.root()).is_empty());
    }

    #[test]
    fn recurses_into_matching_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let group_dir = dir.path().join("10-group");
        fs::create_dir(&group_dir).unwrap();
        let script = group_dir.join("20-build.swd");
        fs::write(&script, "#!/bin/bash\n").unwrap();
        make_executable(&script);
        let not_a_group = dir.path().join("plainfolder");
        fs::create_dir(&not_a_group).unwrap();

        let tree = scan(dir.path()).unwrap();
        let root = tree.root();
        assert_eq!(tree.group_children(root).len(), 1);
        let group = tree.group_children(root)[0];
        assert_eq!(tree.name(group), "10-group");
        assert_eq!(tree.canonical_path(tree.group_children(group)[0]), "10-group/20-build");
    }
}
